//! Structured keyboard input session
//!
//! One session per `INPUT` statement. Each field is converted when its
//! editor finishes; the session only accepts after a submit that converts
//! every field again and finds them all valid. A single-field session
//! accepts as soon as that field converts.

use tracing::debug;

use crate::engine::{Engine, EngineString, InputRequest, KeyboardInput, KeyboardInputType, Value, ValueType};
use crate::error::FieldError;

/// Longest string an `INPUT` field may hold, in device bytes
pub const MAX_STRING_LEN: usize = 255;
const MAX_REAL: f64 = 1.7e38;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DialogState {
    Editing,
    ValidatingAll,
    Accepted,
    Rejected,
}

struct FieldSlot {
    kind: KeyboardInputType,
    value: Option<KeyboardInput>,
    error: Option<FieldError>,
}

pub struct InputDialog {
    prompt: Option<String>,
    slots: Vec<FieldSlot>,
    state: DialogState,
}

impl InputDialog {
    pub fn new(request: InputRequest) -> Self {
        let slots = request
            .fields
            .into_iter()
            .map(|kind| FieldSlot { kind, value: None, error: None })
            .collect();
        Self { prompt: request.prompt, slots, state: DialogState::Editing }
    }

    pub fn state(&self) -> DialogState {
        self.state
    }

    pub fn prompt(&self) -> Option<&str> {
        self.prompt.as_deref()
    }

    pub fn field_count(&self) -> usize {
        self.slots.len()
    }

    pub fn field_kind(&self, idx: usize) -> Option<&KeyboardInputType> {
        self.slots.get(idx).map(|s| &s.kind)
    }

    pub fn field_label(&self, idx: usize) -> String {
        match self.field_kind(idx) {
            Some(KeyboardInputType::Integer) => "Integer".to_string(),
            Some(KeyboardInputType::Real) => "Real".to_string(),
            Some(KeyboardInputType::String) => "String".to_string(),
            Some(KeyboardInputType::Func { name, param }) => format!("FN {}({}) =", name, param),
            None => String::new(),
        }
    }

    pub fn field_error(&self, idx: usize) -> Option<&FieldError> {
        self.slots.get(idx).and_then(|s| s.error.as_ref())
    }

    pub fn is_field_valid(&self, idx: usize) -> bool {
        self.slots.get(idx).map(|s| s.value.is_some()).unwrap_or(false)
    }

    /// Field editor `idx` lost focus or got Enter. Returns whether the text
    /// converted.
    pub fn finish_field<E: Engine + ?Sized>(&mut self, idx: usize, text: &str, engine: &mut E) -> bool {
        if self.state != DialogState::Editing || idx >= self.slots.len() {
            return false;
        }
        let ok = self.validate(idx, text, engine);
        if ok && self.slots.len() == 1 {
            self.state = DialogState::Accepted;
            debug!("single field accepted");
        }
        ok
    }

    /// Convert every field from `texts` and accept if all of them succeed
    pub fn submit_all<E: Engine + ?Sized>(&mut self, texts: &[String], engine: &mut E) -> DialogState {
        if self.state != DialogState::Editing {
            return self.state;
        }
        self.state = DialogState::ValidatingAll;

        let mut succeeded = 0;
        for idx in 0..self.slots.len() {
            let text = texts.get(idx).map(String::as_str).unwrap_or("");
            if self.validate(idx, text, engine) {
                succeeded += 1;
            }
        }

        self.state = if succeeded == self.slots.len() {
            DialogState::Accepted
        } else {
            DialogState::Editing
        };
        debug!(succeeded, fields = self.slots.len(), state = ?self.state, "submit all");
        self.state
    }

    /// Close without submitting. Converted values go back to the engine.
    pub fn cancel<E: Engine + ?Sized>(&mut self, engine: &mut E) {
        if self.state == DialogState::Accepted {
            return;
        }
        for slot in &mut self.slots {
            if let Some(value) = slot.value.take() {
                engine.release(value);
            }
        }
        self.state = DialogState::Rejected;
    }

    /// Hand over the converted values of an accepted session
    pub fn take_values(&mut self) -> Option<Vec<KeyboardInput>> {
        if self.state != DialogState::Accepted {
            return None;
        }
        self.slots.iter_mut().map(|s| s.value.take()).collect()
    }

    fn validate<E: Engine + ?Sized>(&mut self, idx: usize, text: &str, engine: &mut E) -> bool {
        let slot = &mut self.slots[idx];
        if let Some(old) = slot.value.take() {
            engine.release(old);
        }
        match convert(&slot.kind, text, engine) {
            Ok(value) => {
                slot.value = Some(value);
                slot.error = None;
                true
            }
            Err(err) => {
                slot.error = Some(err);
                false
            }
        }
    }
}

fn convert<E: Engine + ?Sized>(
    kind: &KeyboardInputType,
    text: &str,
    engine: &mut E,
) -> Result<KeyboardInput, FieldError> {
    match kind {
        KeyboardInputType::Integer => parse_integer(text).map(KeyboardInput::Integer),
        KeyboardInputType::Real => parse_real(text).map(KeyboardInput::Real),
        KeyboardInputType::String => encode_field(text, engine).map(KeyboardInput::String),
        KeyboardInputType::Func { .. } => {
            let utf16: Vec<u16> = text.encode_utf16().collect();
            let compiled = engine.compile_fn_body(&utf16);
            let first = compiled
                .first_error()
                .map(|d| (d.start + 1, d.message.clone()));
            match first {
                Some((column, message)) => {
                    engine.release(KeyboardInput::Func(compiled.body));
                    Err(FieldError::Compile { column, message })
                }
                None => Ok(KeyboardInput::Func(compiled.body)),
            }
        }
    }
}

/// Convert inspector text with the same rules as an `INPUT` field
pub fn convert_value<E: Engine + ?Sized>(ty: ValueType, text: &str, engine: &mut E) -> Result<Value, FieldError> {
    match ty {
        ValueType::Integer => parse_integer(text).map(Value::Integer),
        ValueType::Real => parse_real(text).map(Value::Real),
        ValueType::String => encode_field(text, engine).map(Value::String),
    }
}

fn encode_field<E: Engine + ?Sized>(text: &str, engine: &mut E) -> Result<EngineString, FieldError> {
    let utf16: Vec<u16> = text.encode_utf16().collect();
    let s = engine.encode_string(&utf16)?;
    if s.len() > MAX_STRING_LEN {
        let len = s.len();
        engine.release(KeyboardInput::String(s));
        return Err(FieldError::StringTooLong(len));
    }
    Ok(s)
}

fn parse_integer(text: &str) -> Result<i16, FieldError> {
    use std::num::IntErrorKind;

    match text.trim().parse::<i64>() {
        Ok(n) => i16::try_from(n).map_err(|_| FieldError::IntegerOutOfRange),
        Err(e) => match e.kind() {
            IntErrorKind::PosOverflow | IntErrorKind::NegOverflow => {
                Err(FieldError::IntegerOutOfRange)
            }
            _ => Err(FieldError::InvalidInteger),
        },
    }
}

fn parse_real(text: &str) -> Result<f64, FieldError> {
    let x: f64 = text.trim().parse().map_err(|_| FieldError::InvalidReal)?;
    if x.is_nan() {
        return Err(FieldError::InvalidReal);
    }
    if !x.is_finite() || x.abs() > MAX_REAL {
        return Err(FieldError::RealOutOfRange);
    }
    Ok(x)
}
