//! Scripted engine and device doubles for scheduler and dialog tests

use std::collections::VecDeque;

use super::vars::VarStore;
use super::{
    Binding, Device, Diagnostic, Engine, EngineString, ExecInput, ExecResult, FnBody,
    FnCompilation, KeyboardInput, Rect, Severity, Value,
};
use crate::error::{BindingError, StopError, StringError};

/// Engine that returns queued results and records every call
#[derive(Default)]
pub struct MockEngine {
    pub results: VecDeque<ExecResult>,
    /// Inputs passed to each exec call, in order
    pub exec_calls: Vec<ExecInput>,
    pub stop_calls: usize,
    pub reset_calls: usize,
    pub stop_result: Option<StopError>,
    pub released: Vec<KeyboardInput>,
    /// Function bodies containing this text fail to compile
    pub reject_fn_containing: Option<String>,
    pub vars: VarStore,
    next_fn_id: u64,
}

impl MockEngine {
    pub fn with_results(results: impl IntoIterator<Item = ExecResult>) -> Self {
        Self { results: results.into_iter().collect(), ..Default::default() }
    }

    /// Function bodies containing `pattern` fail to compile
    pub fn rejecting(pattern: &str) -> Self {
        Self { reject_fn_containing: Some(pattern.to_string()), ..Default::default() }
    }

    pub fn exec_count(&self) -> usize {
        self.exec_calls.len()
    }
}

impl Engine for MockEngine {
    fn exec(&mut self, input: ExecInput, _max_steps: usize) -> ExecResult {
        self.exec_calls.push(input);
        self.results.pop_front().unwrap_or(ExecResult::End)
    }

    fn stop(&mut self) -> Result<(), StopError> {
        self.stop_calls += 1;
        match self.stop_result.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn reset(&mut self) {
        self.reset_calls += 1;
    }

    fn compile_fn_body(&mut self, source: &[u16]) -> FnCompilation {
        let text = String::from_utf16_lossy(source);
        self.next_fn_id += 1;
        let diagnostics = match &self.reject_fn_containing {
            Some(bad) => text
                .match_indices(bad.as_str())
                .map(|(start, m)| Diagnostic {
                    start,
                    end: start + m.len(),
                    severity: Severity::Error,
                    message: format!("unexpected {}", m),
                })
                .collect(),
            None => Vec::new(),
        };
        FnCompilation { body: FnBody::new(self.next_fn_id, text), diagnostics }
    }

    fn encode_string(&mut self, text: &[u16]) -> Result<EngineString, StringError> {
        let decoded = String::from_utf16(text).map_err(|_| StringError::InvalidUtf16)?;
        match decoded.chars().find(|c| !c.is_ascii()) {
            Some(c) => Err(StringError::InvalidChar(c as u32)),
            None => Ok(EngineString(decoded.into_bytes())),
        }
    }

    fn release(&mut self, value: KeyboardInput) {
        self.released.push(value);
    }

    fn bindings(&self) -> Vec<Binding> {
        self.vars.bindings()
    }

    fn var_value(&self, name: &str) -> Option<Value> {
        self.vars.get(name)
    }

    fn modify_var(&mut self, name: &str, value: Value) -> Result<(), BindingError> {
        self.vars.modify(name, value)
    }

    fn array_value(&self, name: &str, subscripts: &[u16]) -> Option<Value> {
        self.vars.element(name, subscripts)
    }

    fn modify_array(&mut self, name: &str, subscripts: &[u16], value: Value) -> Result<(), BindingError> {
        self.vars.set_element(name, subscripts, value)
    }
}

/// Device with a plain key queue and call counters
#[derive(Default)]
pub struct MockDevice {
    pub keys: VecDeque<u8>,
    pub key_downs: Vec<u8>,
    pub key_ups: Vec<u8>,
    pub blinks: usize,
    pub cursor_hides: usize,
    pub resets: usize,
    pub dirty: Option<Rect>,
    pub lit: Vec<(u32, u32)>,
}

impl Device for MockDevice {
    fn reset(&mut self) {
        self.resets += 1;
        self.keys.clear();
    }

    fn assign_key(&mut self, input: &mut ExecInput) -> bool {
        match self.keys.pop_front() {
            Some(key) => {
                *input = ExecInput::Key(key);
                true
            }
            None => false,
        }
    }

    fn fire_key_down(&mut self, key: u8) {
        self.key_downs.push(key);
        self.keys.push_back(key);
    }

    fn fire_key_up(&mut self, key: u8) {
        self.key_ups.push(key);
    }

    fn blink_cursor(&mut self) {
        self.blinks += 1;
    }

    fn hide_cursor(&mut self) {
        self.cursor_hides += 1;
    }

    fn is_pressed(&self, key: u8) -> bool {
        let downs = self.key_downs.iter().filter(|&&k| k == key).count();
        let ups = self.key_ups.iter().filter(|&&k| k == key).count();
        downs > ups
    }

    fn take_dirty_area(&mut self) -> Option<Rect> {
        self.dirty.take()
    }

    fn pixel(&self, x: u32, y: u32) -> bool {
        self.lit.contains(&(x, y))
    }
}
