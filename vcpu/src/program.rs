//! Program text loading and instruction decoding.
//!
//! Source is line-based. Lines are trimmed; blank lines and lines starting
//! with `#` are dropped. Section markers are case-insensitive:
//!
//! - `.data` / `.enddata`: `name value` pairs. Lines with fewer than two
//!   fields are skipped. A value that is not an integer is a [`ParseError`].
//! - `.code` / `.endcode`: `[label:] OPCODE [operand]`. A label maps to
//!   the index of the next instruction, so a label may sit on its own line.
//!
//! Lines outside both sections are ignored.

use crate::error::ParseError;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Instruction operand as written in the source
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    /// `#<integer>` literal
    Immediate(i32),
    /// Bare identifier naming a data-store entry
    Direct(String),
    /// Literal that failed to parse; reported when executed
    Malformed(String),
    /// Nothing after the opcode
    Missing,
}

impl Operand {
    /// Decodes an operand for data instructions
    fn decode(text: Option<&str>) -> Self {
        match text {
            None => Operand::Missing,
            Some(text) => match text.strip_prefix('#') {
                Some(literal) => literal
                    .parse()
                    .map(Operand::Immediate)
                    .unwrap_or_else(|_| Operand::Malformed(text.to_string())),
                None => Operand::Direct(text.to_string()),
            },
        }
    }

    /// Decodes a syscall code, written as a bare integer
    fn decode_code(text: Option<&str>) -> Self {
        match text {
            None => Operand::Missing,
            Some(text) => text
                .parse()
                .map(Operand::Immediate)
                .unwrap_or_else(|_| Operand::Malformed(text.to_string())),
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Immediate(value) => write!(f, "#{}", value),
            Operand::Direct(name) => write!(f, "{}", name),
            Operand::Malformed(text) => write!(f, "{}", text),
            Operand::Missing => Ok(()),
        }
    }
}

/// Decoded instruction
///
/// Branch targets stay symbolic; they are looked up when the branch is
/// taken so an undefined label only fails on the path that uses it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    Add(Operand),
    Sub(Operand),
    Mult(Operand),
    Div(Operand),
    Load(Operand),
    Store(Operand),
    BrAny(Option<String>),
    BrPos(Option<String>),
    BrZero(Option<String>),
    BrNeg(Option<String>),
    Syscall(Operand),
    /// Opcode outside the instruction set (upper-cased)
    Unknown(String),
}

impl Instruction {
    /// Decodes one instruction (label already stripped)
    pub fn decode(text: &str) -> Self {
        let mut parts = text.split_whitespace();
        let opcode = parts.next().unwrap_or_default().to_uppercase();
        let operand = parts.next();
        let label = operand.map(str::to_string);

        match opcode.as_str() {
            "ADD" => Instruction::Add(Operand::decode(operand)),
            "SUB" => Instruction::Sub(Operand::decode(operand)),
            "MULT" => Instruction::Mult(Operand::decode(operand)),
            "DIV" => Instruction::Div(Operand::decode(operand)),
            "LOAD" => Instruction::Load(Operand::decode(operand)),
            "STORE" => Instruction::Store(Operand::decode(operand)),
            "BRANY" => Instruction::BrAny(label),
            "BRPOS" => Instruction::BrPos(label),
            "BRZERO" => Instruction::BrZero(label),
            "BRNEG" => Instruction::BrNeg(label),
            "SYSCALL" => Instruction::Syscall(Operand::decode_code(operand)),
            _ => Instruction::Unknown(opcode),
        }
    }

    /// Returns the mnemonic
    pub fn mnemonic(&self) -> &str {
        match self {
            Instruction::Add(_) => "ADD",
            Instruction::Sub(_) => "SUB",
            Instruction::Mult(_) => "MULT",
            Instruction::Div(_) => "DIV",
            Instruction::Load(_) => "LOAD",
            Instruction::Store(_) => "STORE",
            Instruction::BrAny(_) => "BRANY",
            Instruction::BrPos(_) => "BRPOS",
            Instruction::BrZero(_) => "BRZERO",
            Instruction::BrNeg(_) => "BRNEG",
            Instruction::Syscall(_) => "SYSCALL",
            Instruction::Unknown(opcode) => opcode,
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.mnemonic())?;
        match self {
            Instruction::Add(op)
            | Instruction::Sub(op)
            | Instruction::Mult(op)
            | Instruction::Div(op)
            | Instruction::Load(op)
            | Instruction::Store(op)
            | Instruction::Syscall(op) => {
                if *op != Operand::Missing {
                    write!(f, " {}", op)?;
                }
            }
            Instruction::BrAny(label)
            | Instruction::BrPos(label)
            | Instruction::BrZero(label)
            | Instruction::BrNeg(label) => {
                if let Some(label) = label {
                    write!(f, " {}", label)?;
                }
            }
            Instruction::Unknown(_) => {}
        }
        Ok(())
    }
}

/// Loaded program
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Program {
    instructions: Vec<Instruction>,
    labels: HashMap<String, usize>,
    data: BTreeMap<String, i32>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Section {
    None,
    Data,
    Code,
}

impl Program {
    /// Parses program text
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        let mut program = Program::default();
        let mut section = Section::None;

        for (line_num, line) in text.lines().enumerate() {
            let line = line.trim();

            // Skip empty lines and comments
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            match line.to_ascii_lowercase().as_str() {
                ".code" => {
                    section = Section::Code;
                    continue;
                }
                ".data" => {
                    section = Section::Data;
                    continue;
                }
                // An end marker only closes its own section
                ".endcode" => {
                    if section == Section::Code {
                        section = Section::None;
                    }
                    continue;
                }
                ".enddata" => {
                    if section == Section::Data {
                        section = Section::None;
                    }
                    continue;
                }
                _ => {}
            }

            match section {
                Section::Code => program.push_code_line(line),
                Section::Data => program.push_data_line(line, line_num + 1)?,
                Section::None => {}
            }
        }

        Ok(program)
    }

    fn push_code_line(&mut self, line: &str) {
        let instruction = match line.split_once(':') {
            Some((label, rest)) => {
                self.labels
                    .insert(label.trim().to_string(), self.instructions.len());
                rest.trim()
            }
            None => line,
        };

        if !instruction.is_empty() {
            self.instructions.push(Instruction::decode(instruction));
        }
    }

    fn push_data_line(&mut self, line: &str, line_num: usize) -> Result<(), ParseError> {
        let mut parts = line.split_whitespace();
        let (Some(name), Some(value)) = (parts.next(), parts.next()) else {
            return Ok(());
        };

        let value = value.parse().map_err(|_| ParseError::InvalidLiteral {
            line: line_num,
            text: value.to_string(),
        })?;
        self.data.insert(name.to_string(), value);
        Ok(())
    }

    /// Returns the decoded instructions
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Returns the number of instructions
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// Returns true if the program has no instructions
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Returns the instruction at `index`
    pub fn instruction(&self, index: usize) -> Option<&Instruction> {
        self.instructions.get(index)
    }

    /// Looks up a label
    pub fn label(&self, name: &str) -> Option<usize> {
        self.labels.get(name).copied()
    }

    /// Returns the initial data store
    pub fn initial_data(&self) -> &BTreeMap<String, i32> {
        &self.data
    }
}
