//! Variable inspector model
//!
//! Lists the program's variables and arrays while it is paused or stopped.
//! An expanded array shows one row per element. Edits are converted with
//! the `INPUT` field rules and written back through the engine.

use std::collections::BTreeSet;

use tracing::debug;

use crate::engine::{Binding, Engine, Value, ValueType};
use crate::error::InspectorError;
use super::input_dialog::convert_value;

/// Element rows listed for one expanded array
const MAX_ELEMENT_ROWS: usize = 256;

pub const ARRAY_PLACEHOLDER: &str = "<array>";

#[derive(Clone, Debug, PartialEq)]
pub enum RowTarget {
    Var(String),
    Array { name: String, dimensions: Vec<u16> },
    Element { name: String, subscripts: Vec<u16> },
}

impl RowTarget {
    fn name(&self) -> &str {
        match self {
            RowTarget::Var(name) | RowTarget::Array { name, .. } | RowTarget::Element { name, .. } => name,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct InspectorRow {
    pub target: RowTarget,
    pub label: String,
    pub value: String,
}

pub struct Inspector {
    enabled: bool,
    rows: Vec<InspectorRow>,
    expanded: BTreeSet<String>,
    selected: usize,
}

impl Default for Inspector {
    fn default() -> Self {
        Self::new()
    }
}

impl Inspector {
    pub fn new() -> Self {
        Self { enabled: true, rows: Vec::new(), expanded: BTreeSet::new(), selected: 0 }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn rows(&self) -> &[InspectorRow] {
        &self.rows
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    fn selected_row(&self) -> Option<&InspectorRow> {
        self.rows.get(self.selected)
    }

    /// Enabled while the program is paused or stopped. Disabling drops the
    /// rows so nothing stale is shown while it runs.
    pub fn set_enabled<E: Engine + ?Sized>(&mut self, enabled: bool, engine: &E) {
        self.enabled = enabled;
        if enabled {
            self.refresh(engine);
        } else {
            self.rows.clear();
        }
    }

    /// Rebuild the rows from the engine's current bindings
    pub fn refresh<E: Engine + ?Sized>(&mut self, engine: &E) {
        self.rows.clear();
        if !self.enabled {
            return;
        }
        let bindings = engine.bindings();
        self.expanded.retain(|name| bindings.iter().any(|b| b.name() == name.as_str()));

        for binding in bindings {
            match binding {
                Binding::Var { name } => {
                    let value = engine.var_value(&name).map(|v| display(&v, engine)).unwrap_or_default();
                    self.rows.push(InspectorRow { label: name.clone(), value, target: RowTarget::Var(name) });
                }
                Binding::Array { name, dimensions } => {
                    let open = self.expanded.contains(&name);
                    self.rows.push(InspectorRow {
                        label: format!("{}{}({})", if open { '-' } else { '+' }, name, join(&dimensions)),
                        value: ARRAY_PLACEHOLDER.to_string(),
                        target: RowTarget::Array { name: name.clone(), dimensions: dimensions.clone() },
                    });
                    if open {
                        for subscripts in elements(&dimensions).take(MAX_ELEMENT_ROWS) {
                            let value = engine
                                .array_value(&name, &subscripts)
                                .map(|v| display(&v, engine))
                                .unwrap_or_default();
                            self.rows.push(InspectorRow {
                                label: format!("  {}({})", name, join(&subscripts)),
                                value,
                                target: RowTarget::Element { name: name.clone(), subscripts },
                            });
                        }
                    }
                }
            }
        }
        self.selected = self.selected.min(self.rows.len().saturating_sub(1));
    }

    pub fn select(&mut self, idx: usize) {
        self.selected = idx.min(self.rows.len().saturating_sub(1));
    }

    pub fn select_next(&mut self) {
        self.select(self.selected + 1);
    }

    pub fn select_prev(&mut self) {
        self.select(self.selected.saturating_sub(1));
    }

    /// Expand or collapse the selected array. False if it is not an array.
    pub fn toggle_expanded<E: Engine + ?Sized>(&mut self, engine: &E) -> bool {
        let Some(RowTarget::Array { name, .. }) = self.selected_row().map(|r| r.target.clone()) else {
            return false;
        };
        if !self.expanded.remove(&name) {
            self.expanded.insert(name);
        }
        self.refresh(engine);
        true
    }

    /// Text to start editing the selected row with. Strings lose their quotes.
    pub fn edit_text<E: Engine + ?Sized>(&self, engine: &E) -> Option<String> {
        if !self.enabled {
            return None;
        }
        let value = match &self.selected_row()?.target {
            RowTarget::Var(name) => engine.var_value(name)?,
            RowTarget::Element { name, subscripts } => engine.array_value(name, subscripts)?,
            RowTarget::Array { .. } => return None,
        };
        Some(match value {
            Value::String(s) => engine.to_utf8_lossy(&s),
            other => display(&other, engine),
        })
    }

    /// Convert `text` for the selected row and store it in the engine
    pub fn commit<E: Engine + ?Sized>(&mut self, text: &str, engine: &mut E) -> Result<(), InspectorError> {
        if !self.enabled {
            return Err(InspectorError::Disabled);
        }
        let target = self.selected_row().map(|r| r.target.clone()).ok_or(InspectorError::NotAValue)?;
        let value = convert_value(ValueType::of_name(target.name()), text, engine)?;
        match &target {
            RowTarget::Var(name) => engine.modify_var(name, value)?,
            RowTarget::Element { name, subscripts } => engine.modify_array(name, subscripts, value)?,
            RowTarget::Array { .. } => return Err(InspectorError::NotAValue),
        }
        debug!(?target, "variable modified");
        self.refresh(engine);
        Ok(())
    }
}

fn display<E: Engine + ?Sized>(value: &Value, engine: &E) -> String {
    match value {
        Value::Integer(n) => n.to_string(),
        Value::Real(x) => format_real(*x),
        Value::String(s) => format!("\"{}\"", engine.to_utf8_lossy(s)),
    }
}

/// Plain notation near 1, exponent notation far from it
fn format_real(x: f64) -> String {
    let magnitude = x.abs();
    if magnitude != 0.0 && !(1e-4..1e9).contains(&magnitude) {
        format!("{:E}", x)
    } else {
        x.to_string()
    }
}

fn join(items: &[u16]) -> String {
    items.iter().map(u16::to_string).collect::<Vec<_>>().join(",")
}

/// Every subscript of an array in row-major order
fn elements(dimensions: &[u16]) -> impl Iterator<Item = Vec<u16>> + '_ {
    let total: usize = dimensions.iter().map(|&d| d as usize + 1).product();
    (0..total).map(move |mut index| {
        let mut subscripts = vec![0u16; dimensions.len()];
        for (slot, &bound) in subscripts.iter_mut().zip(dimensions).rev() {
            let extent = bound as usize + 1;
            *slot = (index % extent) as u16;
            index /= extent;
        }
        subscripts
    })
}
