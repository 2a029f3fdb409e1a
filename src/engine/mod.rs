//! Interface to the BASIC virtual machine and the simulated device.
//!
//! The simulator never looks inside the engine: it only asks it to run a
//! bounded batch of instructions and interprets the tagged result. Device
//! operations (keys, caret, dirty area) go through [`Device`].

pub mod device;
pub mod script;
pub mod vars;

#[cfg(test)]
pub mod mock;

use crate::error::{BindingError, StopError, StringError};

/// Width of the device screen in pixels
pub const SCREEN_WIDTH: u32 = 160;
/// Height of the device screen in pixels
pub const SCREEN_HEIGHT: u32 = 80;

/// Rectangle in device pixel coordinates. `right` and `bottom` are exclusive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Rect {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl Rect {
    pub fn new(left: u32, top: u32, right: u32, bottom: u32) -> Self {
        Self { left, top, right, bottom }
    }

    /// Rectangle from origin and size, clipped to the device screen
    pub fn from_size(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            left: x.min(SCREEN_WIDTH),
            top: y.min(SCREEN_HEIGHT),
            right: x.saturating_add(width).min(SCREEN_WIDTH),
            bottom: y.saturating_add(height).min(SCREEN_HEIGHT),
        }
    }

    pub fn full_screen() -> Self {
        Self::new(0, 0, SCREEN_WIDTH, SCREEN_HEIGHT)
    }

    pub fn width(&self) -> u32 {
        self.right.saturating_sub(self.left)
    }

    pub fn height(&self) -> u32 {
        self.bottom.saturating_sub(self.top)
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.left && x < self.right && y >= self.top && y < self.bottom
    }

    /// Smallest rectangle covering both
    pub fn union(&self, other: &Rect) -> Rect {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        Rect {
            left: self.left.min(other.left),
            top: self.top.min(other.top),
            right: self.right.max(other.right),
            bottom: self.bottom.max(other.bottom),
        }
    }
}

/// Source span of a runtime error. Columns are byte offsets within the line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Location {
    pub line: usize,
    pub start_column: usize,
    pub end_column: usize,
}

/// Type of one value requested by an `INPUT` statement
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KeyboardInputType {
    Integer,
    Real,
    String,
    Func { name: String, param: String },
}

/// String encoded in the device character set. Owned by the engine.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct EngineString(pub Vec<u8>);

impl EngineString {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// Compiled user function body. Opaque outside the engine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FnBody {
    id: u64,
    source: String,
}

impl FnBody {
    pub fn new(id: u64, source: impl Into<String>) -> Self {
        Self { id, source: source.into() }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

/// Type of a variable, given by the suffix of its name: `$` for strings,
/// `%` for integers, none for reals
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValueType {
    Integer,
    Real,
    String,
}

impl ValueType {
    pub fn of_name(name: &str) -> Self {
        if name.ends_with('$') {
            ValueType::String
        } else if name.ends_with('%') {
            ValueType::Integer
        } else {
            ValueType::Real
        }
    }

    pub fn input_type(self) -> KeyboardInputType {
        match self {
            ValueType::Integer => KeyboardInputType::Integer,
            ValueType::Real => KeyboardInputType::Real,
            ValueType::String => KeyboardInputType::String,
        }
    }
}

/// Value held by a variable or an array element
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Integer(i16),
    Real(f64),
    String(EngineString),
}

impl Value {
    /// Value of a variable that was never assigned
    pub fn zero(ty: ValueType) -> Self {
        match ty {
            ValueType::Integer => Value::Integer(0),
            ValueType::Real => Value::Real(0.0),
            ValueType::String => Value::String(EngineString::default()),
        }
    }

    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Integer(_) => ValueType::Integer,
            Value::Real(_) => ValueType::Real,
            Value::String(_) => ValueType::String,
        }
    }
}

/// A variable or array the program has bound
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Binding {
    Var { name: String },
    /// `dimensions` holds the largest subscript of each dimension
    Array { name: String, dimensions: Vec<u16> },
}

impl Binding {
    pub fn name(&self) -> &str {
        match self {
            Binding::Var { name } | Binding::Array { name, .. } => name,
        }
    }

    pub fn value_type(&self) -> ValueType {
        ValueType::of_name(self.name())
    }
}

/// One value supplied to a pending `INPUT` statement
#[derive(Clone, Debug, PartialEq)]
pub enum KeyboardInput {
    Integer(i16),
    Real(f64),
    String(EngineString),
    Func(FnBody),
}

impl KeyboardInput {
    /// Whether the value holds engine-owned storage that must be released
    #[cfg(test)]
    pub fn is_engine_owned(&self) -> bool {
        matches!(self, KeyboardInput::String(_) | KeyboardInput::Func(_))
    }
}

/// A blocking `INPUT` statement waiting for one value per field
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InputRequest {
    pub prompt: Option<String>,
    pub fields: Vec<KeyboardInputType>,
}

/// Result of one bounded step call
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExecResult {
    /// Batch budget exhausted, step again
    Continue,
    /// Yield for this many nanoseconds
    Sleep(u64),
    /// Polling for a single key press
    InKey,
    /// Blocked on a structured `INPUT` statement
    KeyboardInput(InputRequest),
    Error { location: Location, message: String },
    End,
}

impl ExecResult {
    pub fn is_end(&self) -> bool {
        matches!(self, ExecResult::End)
    }

    pub fn is_inkey(&self) -> bool {
        matches!(self, ExecResult::InKey)
    }
}

/// Value passed into the next step call
#[derive(Clone, Debug, PartialEq, Default)]
pub enum ExecInput {
    #[default]
    None,
    Key(u8),
    KeyboardInput(Vec<KeyboardInput>),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

/// Compiler message with a byte span in the compiled source
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    pub start: usize,
    pub end: usize,
    pub severity: Severity,
    pub message: String,
}

/// Output of compiling a typed function body. The body is returned even
/// when there are errors and must then be released.
#[derive(Debug)]
pub struct FnCompilation {
    pub body: FnBody,
    pub diagnostics: Vec<Diagnostic>,
}

impl FnCompilation {
    /// The error with the lowest start offset, if any
    pub fn first_error(&self) -> Option<&Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .min_by_key(|d| d.start)
    }
}

/// The virtual machine running a loaded program
pub trait Engine {
    /// Execute at most `max_steps` instructions
    fn exec(&mut self, input: ExecInput, max_steps: usize) -> ExecResult;

    /// Stop a running program, closing whatever it left open
    fn stop(&mut self) -> Result<(), StopError>;

    /// Rewind to the start of the program
    fn reset(&mut self);

    /// Compile the body of a user function typed into the input dialog
    fn compile_fn_body(&mut self, source: &[u16]) -> FnCompilation;

    /// Encode dialog text into the device character set
    fn encode_string(&mut self, text: &[u16]) -> Result<EngineString, StringError>;

    /// Return a converted input value that will not be consumed
    fn release(&mut self, value: KeyboardInput) {
        drop(value);
    }

    /// Decode a device string for display
    fn to_utf8_lossy(&self, s: &EngineString) -> String {
        String::from_utf8_lossy(s.as_bytes()).into_owned()
    }

    /// Variables and arrays bound so far, in name order
    fn bindings(&self) -> Vec<Binding>;

    fn var_value(&self, name: &str) -> Option<Value>;

    /// Overwrite an existing variable with a value of its own type
    fn modify_var(&mut self, name: &str, value: Value) -> Result<(), BindingError>;

    fn array_value(&self, name: &str, subscripts: &[u16]) -> Option<Value>;

    fn modify_array(&mut self, name: &str, subscripts: &[u16], value: Value) -> Result<(), BindingError>;
}

/// The simulated handheld: screen, keyboard buffer and caret
pub trait Device {
    fn reset(&mut self);

    /// Move a buffered key into `input`. Returns false when no key is waiting.
    fn assign_key(&mut self, input: &mut ExecInput) -> bool;

    fn fire_key_down(&mut self, key: u8);

    fn fire_key_up(&mut self, key: u8);

    fn blink_cursor(&mut self);

    /// Leave the caret off
    fn hide_cursor(&mut self);

    /// Whether `key` is currently held down
    fn is_pressed(&self, key: u8) -> bool;

    /// Union of screen writes since the last call. Clears the dirty state.
    fn take_dirty_area(&mut self) -> Option<Rect>;

    /// Whether the pixel at (x, y) is lit
    fn pixel(&self, x: u32, y: u32) -> bool;
}
