use std::collections::HashMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::parser::{parse_operand, split_line, Body, ParseError};
use crate::{Instruction, Mnemonic, START_LABEL};

/// An assembler directive such as `.globl main`. Directives are kept for
/// inspection but have no effect on execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Directive {
    pub name: String,
    pub args: Vec<String>,
    pub line: usize,
}

/// Metadata about the loaded program
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramMetadata {
    /// Source file name if available
    pub source_file: Option<String>,
}

/// A parsed assembly program.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    /// The program instructions, in source order
    pub instructions: Vec<Instruction>,
    /// Label names mapped to the index of the instruction they precede
    pub labels: HashMap<String, usize>,
    /// Directives, in source order
    pub directives: Vec<Directive>,
    /// Program metadata
    #[serde(default)]
    pub metadata: ProgramMetadata,
}

impl Program {
    /// Parses Intel-syntax assembly source.
    ///
    /// Labels are collected in a first pass so that branches may refer to
    /// labels defined further down.
    ///
    /// ## Errors
    ///
    /// Returns a [`ParseError`] for unknown mnemonics, operand count
    /// mismatches, malformed operands, duplicate labels, and branches to
    /// labels that are never defined.
    pub fn parse(source: &str) -> Result<Self, ParseError> {
        let lines: Vec<_> = source
            .lines()
            .enumerate()
            .map(|(i, raw)| split_line(i + 1, raw))
            .collect();

        let mut labels = HashMap::new();
        let mut instruction_count = 0;
        for line in &lines {
            for label in &line.labels {
                if labels.insert(label.to_string(), instruction_count).is_some() {
                    return Err(ParseError::DuplicateLabel {
                        line: line.number,
                        label: label.to_string(),
                    });
                }
            }
            if matches!(line.body, Some(Body::Instruction { .. })) {
                instruction_count += 1;
            }
        }

        let mut instructions = Vec::with_capacity(instruction_count);
        let mut directives = Vec::new();
        for line in lines {
            match line.body {
                Some(Body::Directive { name, args }) => directives.push(Directive {
                    name: name.to_string(),
                    args: args.into_iter().map(str::to_string).collect(),
                    line: line.number,
                }),
                Some(Body::Instruction { mnemonic, operands }) => {
                    instructions.push(parse_instruction(
                        mnemonic,
                        &operands,
                        &labels,
                        line.number,
                    )?);
                }
                None => {}
            }
        }

        debug!(
            instructions = instructions.len(),
            labels = labels.len(),
            directives = directives.len(),
            "parsed program"
        );

        Ok(Self {
            instructions,
            labels,
            directives,
            metadata: ProgramMetadata::default(),
        })
    }

    pub fn with_source_file(mut self, source_file: impl Into<String>) -> Self {
        self.metadata.source_file = Some(source_file.into());
        self
    }

    /// Index of the instruction a label points to.
    pub fn label(&self, name: &str) -> Option<usize> {
        self.labels.get(name).copied()
    }

    pub fn has_start(&self) -> bool {
        self.labels.contains_key(START_LABEL)
    }

    /// Label names, sorted, for error reporting.
    pub fn label_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.labels.keys().cloned().collect();
        names.sort();
        names
    }

    /// Get the total number of instructions
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// Check if the program is empty
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}

impl FromStr for Program {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn parse_instruction(
    mnemonic_text: &str,
    operands: &[&str],
    labels: &HashMap<String, usize>,
    line: usize,
) -> Result<Instruction, ParseError> {
    let mnemonic =
        Mnemonic::from_str(mnemonic_text).map_err(|()| ParseError::UnknownMnemonic {
            line,
            mnemonic: mnemonic_text.to_string(),
        })?;

    if operands.len() != mnemonic.arity() {
        return Err(ParseError::Arity {
            line,
            mnemonic,
            expected: mnemonic.arity(),
            found: operands.len(),
        });
    }

    let operands = operands
        .iter()
        .map(|text| parse_operand(text, mnemonic, labels, line))
        .collect::<Result<_, _>>()?;

    Ok(Instruction {
        mnemonic,
        operands,
        line,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MemoryRef, Operand, Register, RegisterRef, Width};

    const PLUS_PROGRAM: &str = r#"
	.globl	_plus                   ## -- Begin function plus
_plus:                                  ## @plus
	push	rbp
	mov	rbp, rsp
	mov	dword ptr [rbp - 4], edi
	mov	eax, dword ptr [rbp - 4]
	add	eax, esi
	pop	rbp
	ret
_main:
	mov	edi, 2
	mov	esi, 3
	call	_plus
	ret
"#;

    #[test]
    fn test_parse_labels_and_instructions() {
        let program = Program::parse(PLUS_PROGRAM).unwrap();

        assert_eq!(program.len(), 11);
        assert_eq!(program.label("_plus"), Some(0));
        assert_eq!(program.label("_main"), Some(7));
        assert!(!program.has_start());
        assert_eq!(program.directives.len(), 1);
        assert_eq!(program.directives[0].name, "globl");
        assert_eq!(program.directives[0].args, vec!["_plus"]);
    }

    #[test]
    fn test_parse_records_source_lines() {
        let program = Program::parse(PLUS_PROGRAM).unwrap();
        // Line 1 is empty, the directive is line 2, the label line 3.
        assert_eq!(program.instructions[0].line, 4);
        assert_eq!(
            program.instructions[2],
            Instruction {
                mnemonic: Mnemonic::Mov,
                operands: [
                    Operand::Memory(MemoryRef {
                        width: Some(Width::Dword),
                        base: Some(Register::Rbp),
                        displacement: -4,
                    }),
                    Operand::Register(RegisterRef::dword(Register::Rdi)),
                ]
                .into_iter()
                .collect(),
                line: 6,
            }
        );
    }

    #[test]
    fn test_forward_label_reference() {
        let program = Program::parse("jmp done\nnop\ndone:\nret").unwrap();
        assert_eq!(
            program.instructions[0].operands[0],
            Operand::Label {
                name: "done".to_string(),
                target: 2,
            }
        );
    }

    #[test]
    fn test_label_at_end_of_program() {
        let program = Program::parse("jmp end\nend:").unwrap();
        assert_eq!(program.label("end"), Some(1));
        assert_eq!(program.len(), 1);
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            Program::parse("nop\nimul eax, 3"),
            Err(ParseError::UnknownMnemonic {
                line: 2,
                mnemonic: "imul".to_string(),
            })
        );
        assert_eq!(
            Program::parse("ret rax"),
            Err(ParseError::Arity {
                line: 1,
                mnemonic: Mnemonic::Ret,
                expected: 0,
                found: 1,
            })
        );
        assert_eq!(
            Program::parse("a:\nnop\na:\nret"),
            Err(ParseError::DuplicateLabel {
                line: 3,
                label: "a".to_string(),
            })
        );
        assert_eq!(
            Program::parse("call missing"),
            Err(ParseError::UndefinedLabel {
                line: 1,
                label: "missing".to_string(),
            })
        );
    }

    #[test]
    fn test_empty_source() {
        let program = Program::parse("  \n## only a comment\n").unwrap();
        assert!(program.is_empty());
        assert!(program.labels.is_empty());
    }

    #[test]
    fn test_program_serializes_to_json() {
        let program = Program::parse("_start:\nmov rax, 60\nsyscall")
            .unwrap()
            .with_source_file("exit.s");
        let json = serde_json::to_string(&program).unwrap();
        let decoded: Program = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, program);
        assert_eq!(decoded.metadata.source_file.as_deref(), Some("exit.s"));
    }
}
