use std::collections::{BTreeMap, VecDeque};
use std::fmt::Display;
use std::num::ParseIntError;

use thiserror::Error;

pub type Value = i64;

// Writes further than this past the end of dense memory go to the sparse map.
const DENSE_GROWTH_LIMIT: usize = 1 << 16;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum MachineError {
    #[error("Invalid instruction: {0}")]
    InvalidInstruction(Value),
    #[error("Invalid parameter mode in instruction: {0}")]
    InvalidParameterMode(Value),
    #[error("Tried to access negative address: {0}")]
    NegativeAddress(Value),
    #[error("Tried to write into immediate value: {0}")]
    WriteToImmediate(Value),
    #[error("Arithmetic overflow in instruction at {ip}")]
    Overflow { ip: Value },
    #[error("Tried to read empty input")]
    EmptyInput,
    #[error("Machine has halted")]
    Halted,
}

impl MachineError {
    /// `EmptyInput` leaves the machine parked on the input instruction;
    /// feeding more input and resuming continues the run.
    pub const fn is_recoverable(self) -> bool {
        matches!(self, Self::EmptyInput)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Running,
    Halted,
}

/// Why a call to [`Machine::poll`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Yield {
    Output(Value),
    AwaitingInput,
    Halted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParameterMode {
    Position,
    Immediate,
    Relative,
}

impl ParameterMode {
    const fn from_digit(digit: Value) -> Option<Self> {
        match digit {
            0 => Some(Self::Position),
            1 => Some(Self::Immediate),
            2 => Some(Self::Relative),
            _ => None,
        }
    }

    const fn bind(self, word: Value) -> ArgumentBy {
        match self {
            Self::Position => ArgumentBy::Position(word),
            Self::Immediate => ArgumentBy::Value(word),
            Self::Relative => ArgumentBy::Relative(word),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArgumentBy {
    Position(Value),
    Value(Value),
    Relative(Value),
}

impl ArgumentBy {
    fn read(self, machine: &Machine) -> Result<Value, MachineError> {
        match self {
            Self::Position(address) => machine.read(address),
            Self::Value(val) => Ok(val),
            Self::Relative(offset) => machine.read(machine.relative_address(offset)?),
        }
    }

    fn target(self, machine: &Machine) -> Result<usize, MachineError> {
        match self {
            Self::Position(address) => to_index(address),
            Self::Relative(offset) => to_index(machine.relative_address(offset)?),
            Self::Value(val) => Err(MachineError::WriteToImmediate(val)),
        }
    }
}

impl Display for ArgumentBy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            Self::Position(pos) => write!(f, "#{pos}"),
            Self::Value(val) => write!(f, "{val}"),
            Self::Relative(val) => write!(f, "${val:+}"),
        }
    }
}

struct Operands<'a>(&'a [ArgumentBy]);

impl Display for Operands<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for arg in self.0 {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OpCode {
    Add,
    Mul,
    Input,
    Output,
    JumpIfTrue,
    JumpIfFalse,
    LessThan,
    Equals,
    AdjustRelativeBase,
    Halt,
}

impl OpCode {
    const fn arity(self) -> usize {
        match self {
            Self::Halt => 0,
            Self::Input | Self::Output | Self::AdjustRelativeBase => 1,
            Self::JumpIfTrue | Self::JumpIfFalse => 2,
            Self::Add | Self::Mul | Self::LessThan | Self::Equals => 3,
        }
    }
}

impl TryFrom<Value> for OpCode {
    type Error = MachineError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Ok(match value % 100 {
            1 => Self::Add,
            2 => Self::Mul,
            3 => Self::Input,
            4 => Self::Output,
            5 => Self::JumpIfTrue,
            6 => Self::JumpIfFalse,
            7 => Self::LessThan,
            8 => Self::Equals,
            9 => Self::AdjustRelativeBase,
            99 => Self::Halt,
            _ => return Err(MachineError::InvalidInstruction(value)),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Instruction {
    op: OpCode,
    modes: [ParameterMode; 3],
}

impl TryFrom<Value> for Instruction {
    type Error = MachineError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        let op = OpCode::try_from(value)?;
        let mut modes = [ParameterMode::Position; 3];
        let mut digits = value / 100;
        // Mode digits past the opcode's arity are never looked at.
        for mode in modes.iter_mut().take(op.arity()) {
            *mode = ParameterMode::from_digit(digits % 10)
                .ok_or(MachineError::InvalidParameterMode(value))?;
            digits /= 10;
        }
        Ok(Self { op, modes })
    }
}

fn to_index(address: Value) -> Result<usize, MachineError> {
    usize::try_from(address).map_err(|_| MachineError::NegativeAddress(address))
}

#[derive(Debug, Clone)]
pub struct Machine {
    memory: Vec<Value>,
    sparse: BTreeMap<usize, Value>,
    ip: Value,
    relative_base: Value,
    state: State,
    inputs: VecDeque<Value>,
}

impl Machine {
    pub fn new(program: &[Value]) -> Self {
        Self {
            memory: program.to_vec(),
            sparse: BTreeMap::new(),
            ip: 0,
            relative_base: 0,
            state: State::Running,
            inputs: VecDeque::new(),
        }
    }

    pub fn with_inputs(program: &[Value], inputs: impl IntoIterator<Item = Value>) -> Self {
        let mut machine = Self::new(program);
        machine.feed(inputs);
        machine
    }

    pub const fn state(&self) -> State {
        self.state
    }

    pub fn is_halted(&self) -> bool {
        self.state == State::Halted
    }

    pub const fn ip(&self) -> Value {
        self.ip
    }

    pub const fn relative_base(&self) -> Value {
        self.relative_base
    }

    /// The contiguous part of memory, starting at address 0.
    ///
    /// Words written far beyond its end are kept aside and are only visible
    /// through [`read`](Self::read), until later growth reaches them.
    pub fn memory(&self) -> &[Value] {
        &self.memory
    }

    pub fn into_memory(self) -> Vec<Value> {
        self.memory
    }

    pub fn pending_inputs(&self) -> usize {
        self.inputs.len()
    }

    pub fn feed(&mut self, values: impl IntoIterator<Item = Value>) {
        self.inputs.extend(values);
    }

    pub fn push_input(&mut self, value: Value) {
        self.inputs.push_back(value);
    }

    /// Reads a memory word. Anything past the end of memory reads as zero.
    pub fn read(&self, address: Value) -> Result<Value, MachineError> {
        let index = to_index(address)?;
        Ok(match self.memory.get(index) {
            Some(&value) => value,
            None => self.sparse.get(&index).copied().unwrap_or(0),
        })
    }

    /// Writes a memory word, growing memory with zeros when `address` is past the end.
    pub fn write(&mut self, address: Value, value: Value) -> Result<(), MachineError> {
        let index = to_index(address)?;
        self.store(index, value);
        Ok(())
    }

    fn store(&mut self, index: usize, value: Value) {
        let len = self.memory.len();
        if index < len {
            self.memory[index] = value;
        } else if index - len <= DENSE_GROWTH_LIMIT {
            self.memory.resize(index + 1, 0);
            let beyond = self.sparse.split_off(&(index + 1));
            for (address, word) in std::mem::replace(&mut self.sparse, beyond) {
                self.memory[address] = word;
            }
            self.memory[index] = value;
        } else {
            self.sparse.insert(index, value);
        }
    }

    fn relative_address(&self, offset: Value) -> Result<Value, MachineError> {
        self.relative_base
            .checked_add(offset)
            .ok_or(MachineError::Overflow { ip: self.ip })
    }

    fn offset_ip(&self, offset: Value) -> Result<Value, MachineError> {
        self.ip
            .checked_add(offset)
            .ok_or(MachineError::Overflow { ip: self.ip })
    }

    /// Rewinds the registers and clears the halted state, so a halted machine
    /// runs again from address 0. Memory and pending input are kept.
    pub fn reset(&mut self) {
        self.ip = 0;
        self.relative_base = 0;
        self.state = State::Running;
    }

    /// Restarts from a fresh copy of `program`, discarding memory and pending input.
    pub fn reload(&mut self, program: &[Value]) {
        self.memory.clear();
        self.memory.extend_from_slice(program);
        self.sparse.clear();
        self.inputs.clear();
        self.reset();
    }

    /// Executes a single instruction, returning the value it output, if any.
    ///
    /// A failing instruction leaves memory, registers and input untouched.
    pub fn step(&mut self) -> Result<Option<Value>, MachineError> {
        if self.state == State::Halted {
            return Err(MachineError::Halted);
        }
        let ip = self.ip;
        let Instruction { op, modes } = Instruction::try_from(self.read(ip)?)?;
        let width = op.arity();
        let mut args = [ArgumentBy::Value(0); 3];
        for (offset, (arg, mode)) in (1..).zip(args.iter_mut().zip(modes).take(width)) {
            *arg = mode.bind(self.read(self.offset_ip(offset)?)?);
        }
        log::trace!("[{ip}] {op:?}{}", Operands(&args[..width]));

        let [arg1, arg2, arg3] = args;
        let fallthrough = self.offset_ip(1 + width as Value)?;
        let mut output = None;
        let jump = match op {
            OpCode::Add | OpCode::Mul | OpCode::LessThan | OpCode::Equals => {
                let (lhs, rhs) = (arg1.read(self)?, arg2.read(self)?);
                let value = match op {
                    OpCode::Add => lhs.checked_add(rhs).ok_or(MachineError::Overflow { ip })?,
                    OpCode::Mul => lhs.checked_mul(rhs).ok_or(MachineError::Overflow { ip })?,
                    OpCode::LessThan => Value::from(lhs < rhs),
                    _ => Value::from(lhs == rhs),
                };
                let dest = arg3.target(self)?;
                self.store(dest, value);
                None
            }
            OpCode::Input => {
                let dest = arg1.target(self)?;
                let value = self.inputs.pop_front().ok_or(MachineError::EmptyInput)?;
                self.store(dest, value);
                None
            }
            OpCode::Output => {
                output = Some(arg1.read(self)?);
                None
            }
            OpCode::JumpIfTrue => {
                let condition = arg1.read(self)?;
                if condition != 0 {
                    Some(arg2.read(self)?)
                } else {
                    None
                }
            }
            OpCode::JumpIfFalse => {
                let condition = arg1.read(self)?;
                if condition == 0 {
                    Some(arg2.read(self)?)
                } else {
                    None
                }
            }
            OpCode::AdjustRelativeBase => {
                self.relative_base = self.relative_address(arg1.read(self)?)?;
                None
            }
            OpCode::Halt => {
                log::debug!("[{ip}] halted");
                self.state = State::Halted;
                Some(ip)
            }
        };
        self.ip = jump.unwrap_or(fallthrough);
        Ok(output)
    }

    /// Runs until the next output (`Some`) or until the machine halts (`None`).
    ///
    /// Resuming a halted machine does nothing. Running out of input yields
    /// [`MachineError::EmptyInput`] with the input instruction still pending, so
    /// the caller can [`feed`](Self::feed) more and resume.
    pub fn resume(&mut self) -> Result<Option<Value>, MachineError> {
        while self.state == State::Running {
            if let Some(value) = self.step()? {
                return Ok(Some(value));
            }
        }
        Ok(None)
    }

    /// Like [`resume`](Self::resume), but reports missing input as
    /// [`Yield::AwaitingInput`] instead of an error.
    pub fn poll(&mut self) -> Result<Yield, MachineError> {
        match self.resume() {
            Ok(Some(value)) => Ok(Yield::Output(value)),
            Ok(None) => Ok(Yield::Halted),
            Err(MachineError::EmptyInput) => {
                log::debug!("[{}] awaiting input", self.ip);
                Ok(Yield::AwaitingInput)
            }
            Err(err) => Err(err),
        }
    }

    pub fn run_to_halt(&mut self) -> Result<Vec<Value>, MachineError> {
        let mut outputs = Vec::new();
        while let Some(value) = self.resume()? {
            outputs.push(value);
        }
        Ok(outputs)
    }

    pub fn run_until_input(&mut self) -> Result<Vec<Value>, MachineError> {
        let mut outputs = Vec::new();
        while let Yield::Output(value) = self.poll()? {
            outputs.push(value);
        }
        Ok(outputs)
    }
}

pub fn parse_program(input: &str) -> Result<Vec<Value>, ParseIntError> {
    input
        .split(',')
        .map(str::trim_ascii)
        .map(str::parse)
        .collect()
}
