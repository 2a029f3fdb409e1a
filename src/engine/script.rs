//! Script engine with generator-based execution
//!
//! Replays a small line-oriented program through the [`Engine`] interface so
//! the simulator can be driven without the GVBASIC runtime. The program runs
//! inside a generator: every executed instruction yields a tick that counts
//! against the batch budget, and suspending instructions yield the
//! [`ExecResult`] the scheduler has to act on. The generator is resumed with
//! the next [`ExecInput`].

use std::cell::RefCell;
use std::future::Future;
use std::rc::Rc;

use async_recursion::async_recursion;
use genawaiter::rc::{Co, Gen};
use genawaiter::GeneratorState;
use tracing::{debug, warn};

use super::device::ScriptDevice;
use super::vars::VarStore;
use super::{
    Binding, Diagnostic, Engine, EngineString, ExecInput, ExecResult, FnBody, FnCompilation,
    InputRequest, KeyboardInput, KeyboardInputType, Location, Rect, Severity, Value, ValueType,
};
use crate::error::{BindingError, ScriptError, StopError, StringError};

/// Numeric operand: a literal or the current value of a variable
#[derive(Clone, Debug, PartialEq)]
pub enum Arg {
    Lit(u32),
    Var(String),
}

/// A parsed script instruction
#[derive(Clone, Debug, PartialEq)]
pub enum Op {
    Cls,
    Fill(Rect),
    Clear(Rect),
    Invert(Rect),
    Cursor(Arg, Arg),
    Work(u32),
    /// Milliseconds
    Sleep(u64),
    InKey,
    /// `targets` names the variable each field is stored in, if any
    Input { request: InputRequest, targets: Vec<Option<String>> },
    Let { name: String, subscripts: Vec<u16>, value: Value },
    Dim { name: String, dimensions: Vec<u16> },
    Open(String),
    Close,
    Error(String),
    Repeat { count: u32, body: Vec<Instruction> },
    End,
}

/// An instruction with the source line it came from
#[derive(Clone, Debug, PartialEq)]
pub struct Instruction {
    pub line: usize,
    /// Length of the source line, used as the end column of errors
    pub width: usize,
    pub op: Op,
}

impl Instruction {
    fn location(&self) -> Location {
        Location { line: self.line, start_column: 0, end_column: self.width }
    }

    fn fault(&self, message: impl Into<String>) -> Fault {
        Fault { location: self.location(), message: message.into() }
    }
}

/// Line text before its `#` comment. A `#` inside quotes is kept.
fn strip_comment(raw: &str) -> &str {
    let mut quoted = false;
    for (i, c) in raw.char_indices() {
        match c {
            '"' => quoted = !quoted,
            '#' if !quoted => return &raw[..i],
            _ => {}
        }
    }
    raw
}

/// Parse a program script
pub fn parse(source: &str) -> Result<Vec<Instruction>, ScriptError> {
    // Open `repeat` blocks: (line, count, width, instructions before the block)
    let mut stack: Vec<(usize, u32, usize, Vec<Instruction>)> = Vec::new();
    let mut current: Vec<Instruction> = Vec::new();

    for (line, raw) in source.lines().enumerate() {
        let text = strip_comment(raw).trim();
        if text.is_empty() {
            continue;
        }
        let width = raw.trim_end().len();
        let (keyword, rest) = match text.split_once(char::is_whitespace) {
            Some((k, r)) => (k, r.trim()),
            None => (text, ""),
        };
        let keyword = keyword.to_ascii_lowercase();

        let op = match keyword.as_str() {
            "cls" => Op::Cls,
            "fill" => Op::Fill(parse_rect(line, rest)?),
            "clear" => Op::Clear(parse_rect(line, rest)?),
            "invert" => Op::Invert(parse_rect(line, rest)?),
            "cursor" => match rest.split_whitespace().collect::<Vec<_>>()[..] {
                [x, y] => Op::Cursor(parse_arg(line, x)?, parse_arg(line, y)?),
                _ => return Err(ScriptError::new(line, "expected 2 arguments")),
            },
            "work" => Op::Work(parse_numbers(line, rest, 1)?[0]),
            "sleep" => Op::Sleep(parse_numbers(line, rest, 1)?[0] as u64),
            "inkey" => Op::InKey,
            "input" => parse_input(line, rest)?,
            "let" => parse_let(line, rest)?,
            "dim" => {
                let (name, dimensions) = parse_target(line, rest)?;
                if dimensions.is_empty() {
                    return Err(ScriptError::new(line, "dimensions expected"));
                }
                Op::Dim { name, dimensions }
            }
            "open" => {
                if rest.is_empty() {
                    return Err(ScriptError::new(line, "file name expected"));
                }
                Op::Open(rest.to_string())
            }
            "close" => Op::Close,
            "error" => Op::Error(rest.to_string()),
            "end" => Op::End,
            "repeat" => {
                let count = parse_numbers(line, rest, 1)?[0];
                stack.push((line, count, width, std::mem::take(&mut current)));
                continue;
            }
            "next" => {
                let (start, count, start_width, outer) = stack
                    .pop()
                    .ok_or_else(|| ScriptError::new(line, "NEXT without REPEAT"))?;
                let body = std::mem::replace(&mut current, outer);
                current.push(Instruction {
                    line: start,
                    width: start_width,
                    op: Op::Repeat { count, body },
                });
                continue;
            }
            other => return Err(ScriptError::new(line, format!("unknown instruction: {}", other))),
        };
        current.push(Instruction { line, width, op });
    }

    if let Some((line, ..)) = stack.pop() {
        return Err(ScriptError::new(line, "REPEAT without NEXT"));
    }
    Ok(current)
}

fn parse_numbers(line: usize, text: &str, count: usize) -> Result<Vec<u32>, ScriptError> {
    let values = text
        .split_whitespace()
        .map(|t| t.parse::<u32>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ScriptError::new(line, format!("invalid number: {}", e)))?;
    if values.len() != count {
        return Err(ScriptError::new(
            line,
            format!("expected {} arguments, found {}", count, values.len()),
        ));
    }
    Ok(values)
}

fn parse_rect(line: usize, text: &str) -> Result<Rect, ScriptError> {
    let v = parse_numbers(line, text, 4)?;
    Ok(Rect::from_size(v[0], v[1], v[2], v[3]))
}

/// `A`, `N$`, `B1%`: an uppercase letter, then letters or digits, then an
/// optional type suffix
fn is_var_name(text: &str) -> bool {
    let stem = text.strip_suffix(|c| c == '$' || c == '%').unwrap_or(text);
    let mut chars = stem.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_uppercase())
        && chars.all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
}

fn parse_arg(line: usize, text: &str) -> Result<Arg, ScriptError> {
    if is_var_name(text) {
        return Ok(Arg::Var(text.to_string()));
    }
    text.parse()
        .map(Arg::Lit)
        .map_err(|e| ScriptError::new(line, format!("invalid number: {}", e)))
}

/// `NAME` or `NAME(i,j,...)`
fn parse_target(line: usize, text: &str) -> Result<(String, Vec<u16>), ScriptError> {
    let (name, subscripts) = match text.split_once('(') {
        Some((name, rest)) => {
            let inner = rest
                .strip_suffix(')')
                .ok_or_else(|| ScriptError::new(line, "')' expected"))?;
            let subscripts = inner
                .split(',')
                .map(|s| s.trim().parse::<u16>())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| ScriptError::new(line, format!("invalid subscript: {}", e)))?;
            (name, subscripts)
        }
        None => (text, Vec::new()),
    };
    if !is_var_name(name) {
        return Err(ScriptError::new(line, format!("invalid variable name: {}", name)));
    }
    Ok((name.to_string(), subscripts))
}

fn parse_let(line: usize, text: &str) -> Result<Op, ScriptError> {
    let (target, literal) = text
        .split_once(char::is_whitespace)
        .ok_or_else(|| ScriptError::new(line, "value expected"))?;
    let (name, subscripts) = parse_target(line, target)?;
    let value = parse_literal(line, ValueType::of_name(&name), literal.trim())?;
    Ok(Op::Let { name, subscripts, value })
}

fn parse_literal(line: usize, ty: ValueType, text: &str) -> Result<Value, ScriptError> {
    let invalid = || ScriptError::new(line, format!("invalid value: {}", text));
    match ty {
        ValueType::Integer => text.parse().map(Value::Integer).map_err(|_| invalid()),
        ValueType::Real => text
            .parse::<f64>()
            .ok()
            .filter(|x| x.is_finite())
            .map(Value::Real)
            .ok_or_else(invalid),
        ValueType::String => {
            let inner = text
                .strip_prefix('"')
                .and_then(|t| t.strip_suffix('"'))
                .filter(|t| t.is_ascii())
                .ok_or_else(invalid)?;
            Ok(Value::String(EngineString(inner.as_bytes().to_vec())))
        }
    }
}

fn parse_input(line: usize, text: &str) -> Result<Op, ScriptError> {
    let (prompt, rest) = if let Some(quoted) = text.strip_prefix('"') {
        let end = quoted
            .find('"')
            .ok_or_else(|| ScriptError::new(line, "unterminated prompt"))?;
        (Some(quoted[..end].to_string()), &quoted[end + 1..])
    } else {
        (None, text)
    };

    let (fields, targets): (Vec<_>, Vec<_>) = rest
        .split_whitespace()
        .map(|f| parse_field(line, f))
        .collect::<Result<Vec<_>, _>>()?
        .into_iter()
        .unzip();
    if fields.is_empty() {
        return Err(ScriptError::new(line, "INPUT needs at least one field"));
    }
    Ok(Op::Input { request: InputRequest { prompt, fields }, targets })
}

/// A type keyword, or a variable name whose suffix gives the type
fn parse_field(line: usize, text: &str) -> Result<(KeyboardInputType, Option<String>), ScriptError> {
    if is_var_name(text) {
        return Ok((ValueType::of_name(text).input_type(), Some(text.to_string())));
    }
    let kind = match text {
        "int" => Ok(KeyboardInputType::Integer),
        "real" => Ok(KeyboardInputType::Real),
        "str" => Ok(KeyboardInputType::String),
        _ => {
            let func = text
                .strip_prefix("fn:")
                .and_then(|f| f.strip_suffix(')'))
                .and_then(|f| f.split_once('('))
                .filter(|(name, param)| !name.is_empty() && !param.is_empty());
            match func {
                Some((name, param)) => Ok(KeyboardInputType::Func {
                    name: name.to_string(),
                    param: param.to_string(),
                }),
                None => Err(ScriptError::new(line, format!("unknown field type: {}", text))),
            }
        }
    }?;
    Ok((kind, None))
}

/// Why the program yielded control
#[derive(Debug)]
enum Yield {
    /// One instruction executed
    Tick,
    /// Cannot proceed until the scheduler acts on this result
    Suspend(ExecResult),
}

#[derive(Debug)]
struct Fault {
    location: Location,
    message: String,
}

enum Flow {
    Next,
    End,
}

/// State shared between the generator and its owner
#[derive(Default)]
struct ProgramState {
    open_file: Option<String>,
    last_key: Option<u8>,
    /// Values received by `input` instructions
    received: usize,
    vars: VarStore,
}

impl ProgramState {
    /// Unassigned variables read as zero; strings are not numbers
    fn eval(&self, arg: &Arg) -> Result<u32, String> {
        match arg {
            Arg::Lit(n) => Ok(*n),
            Arg::Var(name) => match self.vars.get(name) {
                None => Ok(0),
                Some(Value::Integer(n)) => Ok(n.max(0) as u32),
                Some(Value::Real(x)) => Ok(x.max(0.0) as u32),
                Some(Value::String(_)) => Err(format!("type mismatch for {}", name)),
            },
        }
    }

    /// Assign received values to the variables named by the fields
    fn store_inputs(
        &mut self,
        request: &InputRequest,
        targets: &[Option<String>],
        values: Vec<KeyboardInput>,
    ) -> Result<(), BindingError> {
        self.received += values.len();
        for ((value, kind), target) in values.into_iter().zip(&request.fields).zip(targets) {
            let value = match value {
                KeyboardInput::Integer(n) => Value::Integer(n),
                KeyboardInput::Real(x) => Value::Real(x),
                KeyboardInput::String(text) => Value::String(text),
                KeyboardInput::Func(body) => {
                    if let KeyboardInputType::Func { name, param } = kind {
                        debug!(id = body.id(), "FN {}({}) = {}", name, param, body.source());
                    }
                    continue;
                }
            };
            if let Some(name) = target {
                self.vars.assign(name, value)?;
            }
        }
        Ok(())
    }
}

trait Resumable {
    fn resume_with(&mut self, input: ExecInput) -> GeneratorState<Yield, Result<(), Fault>>;
}

struct GenWrapper<F: Future<Output = Result<(), Fault>>> {
    gen: Gen<Yield, ExecInput, F>,
}

impl<F: Future<Output = Result<(), Fault>>> Resumable for GenWrapper<F> {
    fn resume_with(&mut self, input: ExecInput) -> GeneratorState<Yield, Result<(), Fault>> {
        self.gen.resume_with(input)
    }
}

fn create_program(
    program: Rc<Vec<Instruction>>,
    device: ScriptDevice,
    state: Rc<RefCell<ProgramState>>,
) -> Gen<Yield, ExecInput, impl Future<Output = Result<(), Fault>>> {
    Gen::new(|co: Co<Yield, ExecInput>| async move {
        run_block(&co, &program, &device, &state).await.map(|_| ())
    })
}

#[async_recursion(?Send)]
async fn run_block(
    co: &Co<Yield, ExecInput>,
    block: &[Instruction],
    device: &ScriptDevice,
    state: &Rc<RefCell<ProgramState>>,
) -> Result<Flow, Fault> {
    for inst in block {
        match &inst.op {
            Op::Cls => device.clear_screen(),
            Op::Fill(rect) => device.fill(*rect),
            Op::Clear(rect) => device.clear(*rect),
            Op::Invert(rect) => device.invert(*rect),
            Op::Cursor(x, y) => {
                let s = state.borrow();
                let x = s.eval(x).map_err(|m| inst.fault(m))?;
                let y = s.eval(y).map_err(|m| inst.fault(m))?;
                device.set_cursor(x, y);
            }
            Op::Work(n) => {
                for _ in 1..*n {
                    co.yield_(Yield::Tick).await;
                }
            }
            Op::Sleep(ms) => {
                co.yield_(Yield::Suspend(ExecResult::Sleep(ms * 1_000_000))).await;
            }
            Op::InKey => loop {
                if let ExecInput::Key(key) = co.yield_(Yield::Suspend(ExecResult::InKey)).await {
                    state.borrow_mut().last_key = Some(key);
                    break;
                }
            },
            Op::Input { request, targets } => {
                let input = co
                    .yield_(Yield::Suspend(ExecResult::KeyboardInput(request.clone())))
                    .await;
                match input {
                    ExecInput::KeyboardInput(values) if values.len() == request.fields.len() => {
                        state
                            .borrow_mut()
                            .store_inputs(request, targets, values)
                            .map_err(|err| inst.fault(err.to_string()))?;
                    }
                    _ => return Err(inst.fault(format!("INPUT expects {} values", request.fields.len()))),
                }
            }
            Op::Let { name, subscripts, value } => {
                let mut s = state.borrow_mut();
                let stored = if subscripts.is_empty() {
                    s.vars.assign(name, value.clone())
                } else {
                    s.vars.set_element(name, subscripts, value.clone())
                };
                stored.map_err(|err| inst.fault(err.to_string()))?;
            }
            Op::Dim { name, dimensions } => {
                if !state.borrow_mut().vars.dim(name, dimensions.clone()) {
                    return Err(inst.fault(format!("array {} is already dimensioned", name)));
                }
            }
            Op::Open(name) => {
                let mut s = state.borrow_mut();
                if let Some(open) = &s.open_file {
                    return Err(inst.fault(format!("file {} is already open", open)));
                }
                s.open_file = Some(name.clone());
            }
            Op::Close => {
                if state.borrow_mut().open_file.take().is_none() {
                    return Err(inst.fault("no file is open"));
                }
            }
            Op::Error(message) => return Err(inst.fault(message.clone())),
            Op::Repeat { count, body } => {
                for _ in 0..*count {
                    // Counts against the batch even when the body is empty
                    co.yield_(Yield::Tick).await;
                    if let Flow::End = run_block(co, body, device, state).await? {
                        return Ok(Flow::End);
                    }
                }
            }
            Op::End => return Ok(Flow::End),
        }
        co.yield_(Yield::Tick).await;
    }
    Ok(Flow::Next)
}

/// Engine that runs a parsed script against a [`ScriptDevice`]
pub struct ScriptEngine {
    program: Rc<Vec<Instruction>>,
    device: ScriptDevice,
    state: Rc<RefCell<ProgramState>>,
    generator: Option<Box<dyn Resumable>>,
    next_fn_id: u64,
}

impl ScriptEngine {
    pub fn new(program: Vec<Instruction>, device: ScriptDevice) -> Self {
        let mut engine = Self {
            program: Rc::new(program),
            device,
            state: Rc::new(RefCell::new(ProgramState::default())),
            generator: None,
            next_fn_id: 1,
        };
        engine.reset();
        engine
    }

    /// Parse `source` and bind the program to `device`
    pub fn load(source: &str, device: ScriptDevice) -> Result<Self, ScriptError> {
        Ok(Self::new(parse(source)?, device))
    }

    /// Most recent key read by an `inkey` instruction
    #[cfg(test)]
    pub fn last_key(&self) -> Option<u8> {
        self.state.borrow().last_key
    }

    /// Number of values received by `input` instructions since the last reset
    #[cfg(test)]
    pub fn received_inputs(&self) -> usize {
        self.state.borrow().received
    }
}

impl Engine for ScriptEngine {
    fn exec(&mut self, input: ExecInput, max_steps: usize) -> ExecResult {
        let Some(generator) = self.generator.as_mut() else {
            return ExecResult::End;
        };

        let mut input = input;
        let mut steps = 0;
        loop {
            match generator.resume_with(std::mem::take(&mut input)) {
                GeneratorState::Yielded(Yield::Tick) => {
                    steps += 1;
                    if steps >= max_steps.max(1) {
                        return ExecResult::Continue;
                    }
                }
                GeneratorState::Yielded(Yield::Suspend(result)) => return result,
                GeneratorState::Complete(Ok(())) => {
                    self.generator = None;
                    return ExecResult::End;
                }
                GeneratorState::Complete(Err(fault)) => {
                    self.generator = None;
                    debug!(line = fault.location.line, "script fault: {}", fault.message);
                    return ExecResult::Error {
                        location: fault.location,
                        message: fault.message,
                    };
                }
            }
        }
    }

    fn stop(&mut self) -> Result<(), StopError> {
        self.generator = None;
        match self.state.borrow_mut().open_file.take() {
            Some(name) => {
                warn!(file = %name, "program stopped with an open file");
                Err(StopError(format!("file {} was not closed by the program", name)))
            }
            None => Ok(()),
        }
    }

    fn reset(&mut self) {
        *self.state.borrow_mut() = ProgramState::default();
        let gen = create_program(self.program.clone(), self.device.clone(), self.state.clone());
        self.generator = Some(Box::new(GenWrapper { gen }));
    }

    fn compile_fn_body(&mut self, source: &[u16]) -> FnCompilation {
        let text = String::from_utf16_lossy(source);
        let body = FnBody::new(self.next_fn_id, text.clone());
        self.next_fn_id += 1;
        FnCompilation { body, diagnostics: check_fn_body(&text) }
    }

    fn encode_string(&mut self, text: &[u16]) -> Result<EngineString, StringError> {
        let mut bytes = Vec::with_capacity(text.len());
        for c in char::decode_utf16(text.iter().copied()) {
            let c = c.map_err(|_| StringError::InvalidUtf16)?;
            if !c.is_ascii() {
                return Err(StringError::InvalidChar(c as u32));
            }
            bytes.push(c as u8);
        }
        Ok(EngineString(bytes))
    }

    fn bindings(&self) -> Vec<Binding> {
        self.state.borrow().vars.bindings()
    }

    fn var_value(&self, name: &str) -> Option<Value> {
        self.state.borrow().vars.get(name)
    }

    fn modify_var(&mut self, name: &str, value: Value) -> Result<(), BindingError> {
        self.state.borrow_mut().vars.modify(name, value)
    }

    fn array_value(&self, name: &str, subscripts: &[u16]) -> Option<Value> {
        self.state.borrow().vars.element(name, subscripts)
    }

    fn modify_array(&mut self, name: &str, subscripts: &[u16], value: Value) -> Result<(), BindingError> {
        self.state.borrow_mut().vars.set_element(name, subscripts, value)
    }
}

/// Syntax check of a one-line function body
fn check_fn_body(text: &str) -> Vec<Diagnostic> {
    let error = |start: usize, message: String| Diagnostic {
        start,
        end: start + 1,
        severity: Severity::Error,
        message,
    };

    let mut diagnostics = Vec::new();
    if text.trim().is_empty() {
        diagnostics.push(error(0, "expression expected".to_string()));
        return diagnostics;
    }

    let mut open = Vec::new();
    for (i, c) in text.chars().enumerate() {
        match c {
            '(' => open.push(i),
            ')' => {
                if open.pop().is_none() {
                    diagnostics.push(error(i, "unmatched ')'".to_string()));
                }
            }
            c if c.is_ascii_alphanumeric() || " _.+-*/^<>=$".contains(c) => {}
            c => diagnostics.push(error(i, format!("unexpected character '{}'", c))),
        }
    }
    for i in open {
        diagnostics.push(error(i, "unclosed '('".to_string()));
    }
    diagnostics
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Device;

    fn load(source: &str) -> (ScriptEngine, ScriptDevice) {
        let device = ScriptDevice::new();
        let engine = ScriptEngine::load(source, device.clone()).expect("script should parse");
        (engine, device)
    }

    fn utf16(s: &str) -> Vec<u16> {
        s.encode_utf16().collect()
    }

    #[test]
    fn test_parse_nested_repeat() {
        let program = parse("repeat 2\n  repeat 3\n    work 1\n  next\nnext\nend").expect("parse");
        assert_eq!(program.len(), 2);
        match &program[0].op {
            Op::Repeat { count: 2, body } => match &body[0].op {
                Op::Repeat { count: 3, body } => assert_eq!(body[0].op, Op::Work(1)),
                other => panic!("unexpected {:?}", other),
            },
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(program[1].line, 5);
    }

    #[test]
    fn test_parse_errors_report_line() {
        let err = parse("cls\nfill 1 2 3").unwrap_err();
        assert_eq!(err.line, 1);
        assert!(err.message.contains("expected 4 arguments"));

        assert_eq!(parse("next").unwrap_err().message, "NEXT without REPEAT");
        assert_eq!(parse("work 1\nrepeat 2\nwork 1").unwrap_err().line, 1);
        assert!(parse("jump 3").unwrap_err().message.contains("unknown instruction"));
    }

    #[test]
    fn test_parse_input_fields() {
        let program = parse("input \"Name and age\" str A% fn:F(X) real").expect("parse");
        assert_eq!(
            program[0].op,
            Op::Input {
                request: InputRequest {
                    prompt: Some("Name and age".to_string()),
                    fields: vec![
                        KeyboardInputType::String,
                        KeyboardInputType::Integer,
                        KeyboardInputType::Func { name: "F".to_string(), param: "X".to_string() },
                        KeyboardInputType::Real,
                    ],
                },
                targets: vec![None, Some("A%".to_string()), None, None],
            }
        );
        assert!(parse("input \"no fields\"").is_err());
        assert!(parse("input fn:()").is_err());
    }

    #[test]
    fn test_hash_inside_prompt_is_not_a_comment() {
        let program = parse("input \"a#b\" int # trailing").expect("parse");
        match &program[0].op {
            Op::Input { request, .. } => {
                assert_eq!(request.prompt.as_deref(), Some("a#b"));
                assert_eq!(request.fields, vec![KeyboardInputType::Integer]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_parse_let_and_dim() {
        let program = parse("let A% -3\nlet N$ \"HI\"\ndim B(2,3)\nlet B(1,2) 0.5").expect("parse");
        assert_eq!(
            program[0].op,
            Op::Let { name: "A%".into(), subscripts: vec![], value: Value::Integer(-3) }
        );
        assert_eq!(
            program[1].op,
            Op::Let { name: "N$".into(), subscripts: vec![], value: Value::String(EngineString(b"HI".to_vec())) }
        );
        assert_eq!(program[2].op, Op::Dim { name: "B".into(), dimensions: vec![2, 3] });
        assert_eq!(
            program[3].op,
            Op::Let { name: "B".into(), subscripts: vec![1, 2], value: Value::Real(0.5) }
        );

        assert!(parse("let A% 40000").unwrap_err().message.contains("invalid value"));
        assert!(parse("let N$ HI").is_err());
        assert!(parse("let a 1").unwrap_err().message.contains("invalid variable name"));
        assert_eq!(parse("dim C").unwrap_err().message, "dimensions expected");
        assert_eq!(parse("cursor X").unwrap_err().message, "expected 2 arguments");
    }

    #[test]
    fn test_comments_and_blank_lines_are_skipped() {
        let program = parse("# header\n\ncls # clear\n").expect("parse");
        assert_eq!(program, vec![Instruction { line: 2, width: 11, op: Op::Cls }]);
    }

    #[test]
    fn test_batches_respect_step_budget() {
        let (mut engine, _) = load("work 120");
        assert_eq!(engine.exec(ExecInput::None, 50), ExecResult::Continue);
        assert_eq!(engine.exec(ExecInput::None, 50), ExecResult::Continue);
        assert_eq!(engine.exec(ExecInput::None, 50), ExecResult::End);
        assert_eq!(engine.exec(ExecInput::None, 50), ExecResult::End);
    }

    #[test]
    fn test_empty_repeat_respects_step_budget() {
        let (mut engine, _) = load("repeat 1000000\nnext\nend");
        assert_eq!(engine.exec(ExecInput::None, 50), ExecResult::Continue);
        assert_eq!(engine.exec(ExecInput::None, 50), ExecResult::Continue);
    }

    #[test]
    fn test_sleep_yields_nanoseconds() {
        let (mut engine, _) = load("sleep 15\nend");
        assert_eq!(engine.exec(ExecInput::None, 50), ExecResult::Sleep(15_000_000));
        assert_eq!(engine.exec(ExecInput::None, 50), ExecResult::End);
    }

    #[test]
    fn test_inkey_waits_for_key() {
        let (mut engine, _) = load("inkey\nend");
        assert_eq!(engine.exec(ExecInput::None, 50), ExecResult::InKey);
        assert_eq!(engine.exec(ExecInput::None, 50), ExecResult::InKey);
        assert_eq!(engine.exec(ExecInput::Key(97), 50), ExecResult::End);
        assert_eq!(engine.last_key(), Some(97));
    }

    #[test]
    fn test_input_receives_values() {
        let (mut engine, _) = load("input int real\nend");
        match engine.exec(ExecInput::None, 50) {
            ExecResult::KeyboardInput(req) => assert_eq!(req.fields.len(), 2),
            other => panic!("unexpected {:?}", other),
        }
        let values = vec![KeyboardInput::Integer(3), KeyboardInput::Real(1.5)];
        assert_eq!(engine.exec(ExecInput::KeyboardInput(values), 50), ExecResult::End);
        assert_eq!(engine.received_inputs(), 2);
    }

    #[test]
    fn test_input_assigns_named_variables() {
        let (mut engine, _) = load("input N$ fn:F(X) A%\nend");
        engine.exec(ExecInput::None, 50);
        let values = vec![
            KeyboardInput::String(EngineString(b"BOB".to_vec())),
            KeyboardInput::Func(FnBody::new(7, "X*2")),
            KeyboardInput::Integer(12),
        ];
        assert_eq!(engine.exec(ExecInput::KeyboardInput(values), 50), ExecResult::End);
        assert_eq!(engine.received_inputs(), 3);
        assert_eq!(engine.var_value("N$"), Some(Value::String(EngineString(b"BOB".to_vec()))));
        assert_eq!(engine.var_value("A%"), Some(Value::Integer(12)));
        assert_eq!(engine.bindings().len(), 2);
    }

    #[test]
    fn test_variables_survive_stop_and_clear_on_reset() {
        let (mut engine, _) = load("let X 2.5\ndim B%(3)\ninkey");
        assert_eq!(engine.exec(ExecInput::None, 50), ExecResult::InKey);
        assert!(engine.stop().is_ok());
        assert_eq!(
            engine.bindings(),
            vec![
                Binding::Var { name: "X".into() },
                Binding::Array { name: "B%".into(), dimensions: vec![3] },
            ]
        );
        engine.reset();
        assert!(engine.bindings().is_empty());
    }

    #[test]
    fn test_modified_variable_moves_cursor() {
        let (mut engine, device) = load("let X 0\nlet Y% 0\ninkey\ncursor X Y%\ninkey");
        assert_eq!(engine.exec(ExecInput::None, 50), ExecResult::InKey);
        assert!(engine.modify_var("X", Value::Real(20.7)).is_ok());
        assert!(engine.modify_var("Y%", Value::Integer(-4)).is_ok());
        assert_eq!(
            engine.modify_var("Y%", Value::Real(1.0)),
            Err(BindingError::TypeMismatch("Y%".into()))
        );
        assert_eq!(engine.exec(ExecInput::Key(13), 50), ExecResult::InKey);
        let mut device = device;
        device.blink_cursor();
        assert!(device.pixel(20, 10));
        assert!(!device.pixel(19, 10));
    }

    #[test]
    fn test_string_variable_in_cursor_is_an_error() {
        let (mut engine, _) = load("let S$ \"A\"\ncursor S$ 0");
        match engine.exec(ExecInput::None, 50) {
            ExecResult::Error { location, message } => {
                assert_eq!(location.line, 1);
                assert_eq!(message, "type mismatch for S$");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_array_edits() {
        let (mut engine, _) = load("dim A(1,1)\nlet A(1,0) 4\ninkey\ndim A(2)");
        assert_eq!(engine.exec(ExecInput::None, 50), ExecResult::InKey);
        assert_eq!(engine.array_value("A", &[1, 0]), Some(Value::Real(4.0)));
        assert!(engine.modify_array("A", &[0, 1], Value::Real(-1.0)).is_ok());
        assert_eq!(engine.array_value("A", &[0, 1]), Some(Value::Real(-1.0)));
        assert_eq!(
            engine.modify_array("A", &[2, 0], Value::Real(0.0)),
            Err(BindingError::SubscriptOutOfRange("A".into()))
        );
        match engine.exec(ExecInput::Key(1), 50) {
            ExecResult::Error { message, .. } => assert_eq!(message, "array A is already dimensioned"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_input_without_values_is_an_error() {
        let (mut engine, _) = load("input str");
        engine.exec(ExecInput::None, 50);
        match engine.exec(ExecInput::None, 50) {
            ExecResult::Error { location, message } => {
                assert_eq!(location.line, 0);
                assert_eq!(message, "INPUT expects 1 values");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_error_location_spans_line() {
        let (mut engine, _) = load("cls\n  error boom");
        match engine.exec(ExecInput::None, 50) {
            ExecResult::Error { location, message } => {
                assert_eq!(location, Location { line: 1, start_column: 0, end_column: 12 });
                assert_eq!(message, "boom");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_end_inside_repeat_finishes_program() {
        let (mut engine, mut device) = load("repeat 5\nend\nnext\nfill 0 0 1 1");
        assert_eq!(engine.exec(ExecInput::None, 50), ExecResult::End);
        device.take_dirty_area();
        assert!(!device.pixel(0, 0));
    }

    #[test]
    fn test_drawing_reaches_shared_device() {
        let (mut engine, mut device) = load("fill 0 0 8 8\ninvert 4 4 8 8");
        assert_eq!(engine.exec(ExecInput::None, 50), ExecResult::End);
        assert!(device.pixel(0, 0));
        assert!(!device.pixel(5, 5));
        assert!(device.pixel(10, 10));
        assert_eq!(device.take_dirty_area(), Some(Rect::new(0, 0, 12, 12)));
    }

    #[test]
    fn test_stop_reports_open_file() {
        let (mut engine, _) = load("open DATA.DAT\ninkey\nclose");
        assert_eq!(engine.exec(ExecInput::None, 50), ExecResult::InKey);
        let err = engine.stop().unwrap_err();
        assert!(err.0.contains("DATA.DAT"));
        assert_eq!(engine.exec(ExecInput::None, 50), ExecResult::End);
        assert!(engine.stop().is_ok());
    }

    #[test]
    fn test_reset_restarts_program() {
        let (mut engine, _) = load("inkey");
        assert_eq!(engine.exec(ExecInput::None, 50), ExecResult::InKey);
        assert_eq!(engine.exec(ExecInput::Key(1), 50), ExecResult::End);
        engine.reset();
        assert_eq!(engine.last_key(), None);
        assert_eq!(engine.exec(ExecInput::None, 50), ExecResult::InKey);
    }

    #[test]
    fn test_encode_string() {
        let (mut engine, _) = load("end");
        assert_eq!(engine.encode_string(&utf16("HELLO")), Ok(EngineString(b"HELLO".to_vec())));
        assert_eq!(engine.encode_string(&utf16("中")), Err(StringError::InvalidChar(0x4e2d)));
        assert_eq!(engine.encode_string(&[0xd800]), Err(StringError::InvalidUtf16));
    }

    #[test]
    fn test_compile_fn_body_diagnostics() {
        let (mut engine, _) = load("end");
        assert!(engine.compile_fn_body(&utf16("X*X+1")).diagnostics.is_empty());

        let compiled = engine.compile_fn_body(&utf16("(X+1"));
        let first = compiled.first_error().expect("error");
        assert_eq!(first.start, 0);
        assert_eq!(first.message, "unclosed '('");

        let compiled = engine.compile_fn_body(&utf16("X)+@"));
        assert_eq!(compiled.first_error().map(|d| d.start), Some(1));
        assert_eq!(compiled.diagnostics.len(), 2);

        assert!(engine.compile_fn_body(&utf16("  ")).first_error().is_some());
    }
}
