//! Line-level parsing of Intel-syntax assembly.
//!
//! Each source line is reduced to optional labels plus either a directive
//! (`.globl main`) or an instruction (`mov eax, dword ptr [rbp - 4]`).
//! Comments start at `#` or `;` outside of string literals.

use std::collections::HashMap;

use crate::{MemoryRef, Mnemonic, Operand, RegisterRef, Width};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("line {line}: unknown instruction '{mnemonic}'")]
    UnknownMnemonic { line: usize, mnemonic: String },

    #[error("line {line}: '{mnemonic}' expects {expected} operand(s), got {found}")]
    Arity {
        line: usize,
        mnemonic: Mnemonic,
        expected: usize,
        found: usize,
    },

    #[error("line {line}: invalid operand '{operand}': {reason}")]
    InvalidOperand {
        line: usize,
        operand: String,
        reason: &'static str,
    },

    #[error("line {line}: undefined label '{label}'")]
    UndefinedLabel { line: usize, label: String },

    #[error("line {line}: duplicate label '{label}'")]
    DuplicateLabel { line: usize, label: String },
}

/// The meaningful part of a source line.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Body<'a> {
    Directive {
        name: &'a str,
        args: Vec<&'a str>,
    },
    Instruction {
        mnemonic: &'a str,
        operands: Vec<&'a str>,
    },
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) struct SourceLine<'a> {
    /// 1-based line number.
    pub number: usize,
    pub labels: Vec<&'a str>,
    pub body: Option<Body<'a>>,
}

/// Removes a trailing `#` or `;` comment, ignoring comment characters
/// inside double-quoted strings.
pub(crate) fn strip_comment(line: &str) -> &str {
    let mut in_string = false;
    let mut escaped = false;
    for (i, c) in line.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '#' | ';' if !in_string => return &line[..i],
            _ => {}
        }
    }
    line
}

fn is_label_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || matches!(c, '_' | '.' | '$') => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '$'))
}

/// Splits `text` at its first run of whitespace.
fn split_first_token(text: &str) -> (&str, &str) {
    match text.find(char::is_whitespace) {
        Some(i) => (&text[..i], text[i..].trim_start()),
        None => (text, ""),
    }
}

fn split_list(text: &str) -> Vec<&str> {
    text.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .collect()
}

pub(crate) fn split_line(number: usize, raw: &str) -> SourceLine<'_> {
    let mut rest = strip_comment(raw).trim();
    let mut labels = Vec::new();

    loop {
        let (token, remainder) = split_first_token(rest);
        match token.strip_suffix(':') {
            Some(label) if is_label_name(label) => {
                labels.push(label);
                rest = remainder;
            }
            _ => break,
        }
    }

    let body = if rest.is_empty() {
        None
    } else if let Some(directive) = rest.strip_prefix('.') {
        let (name, args) = split_first_token(directive);
        Some(Body::Directive {
            name,
            args: split_list(args),
        })
    } else {
        let (mnemonic, operands) = split_first_token(rest);
        Some(Body::Instruction {
            mnemonic,
            operands: split_list(operands),
        })
    };

    SourceLine {
        number,
        labels,
        body,
    }
}

/// Parses a decimal or `0x` hexadecimal integer, optionally negated.
///
/// Hexadecimal literals above `i64::MAX` are taken as their two's-complement
/// bit pattern.
pub(crate) fn parse_immediate(text: &str) -> Option<i64> {
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest.trim_start()),
        None => (false, text),
    };
    let magnitude = match digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        Some(hex) => u64::from_str_radix(hex, 16).ok()?,
        None => digits.parse::<u64>().ok()?,
    };
    let value = magnitude as i64;
    Some(if negative { value.wrapping_neg() } else { value })
}

/// Parses `[<size> ptr] [base ± displacement ...]`, already lowercased.
fn parse_memory(text: &str) -> Result<MemoryRef, &'static str> {
    let (width, address) = match text.split_once("ptr") {
        Some((size, address)) => (
            Some(Width::from_ptr_keyword(size.trim()).ok_or("unknown operand size")?),
            address.trim(),
        ),
        None => (None, text.trim()),
    };

    let inner = address
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .ok_or("unsupported memory operand")?;

    let mut terms = Vec::new();
    let mut negative = false;
    let mut start = 0;
    for (i, c) in inner.char_indices() {
        if c == '+' || c == '-' {
            terms.push((negative, inner[start..i].trim()));
            negative = c == '-';
            start = i + 1;
        }
    }
    terms.push((negative, inner[start..].trim()));

    // A leading sign leaves an empty first term: `[-8]`.
    if terms.len() > 1 && terms[0].1.is_empty() {
        terms.remove(0);
    }

    let mut base = None;
    let mut displacement = 0i64;
    for (negative, term) in terms {
        if term.is_empty() {
            return Err("empty address term");
        }
        if let Some(view) = RegisterRef::parse(term) {
            if view.width != Width::Qword {
                return Err("address registers must be 64-bit");
            }
            if negative || base.is_some() {
                return Err("only a single added base register is supported");
            }
            base = Some(view.register);
        } else if let Some(value) = parse_immediate(term) {
            displacement = if negative {
                displacement.wrapping_sub(value)
            } else {
                displacement.wrapping_add(value)
            };
        } else {
            return Err("unsupported address term");
        }
    }

    Ok(MemoryRef {
        width,
        base,
        displacement,
    })
}

/// Parses one operand of `mnemonic`, resolving branch targets in `labels`.
pub(crate) fn parse_operand(
    text: &str,
    mnemonic: Mnemonic,
    labels: &HashMap<String, usize>,
    line: usize,
) -> Result<Operand, ParseError> {
    let invalid = |reason| ParseError::InvalidOperand {
        line,
        operand: text.to_string(),
        reason,
    };

    if mnemonic.takes_label() {
        if !is_label_name(text) || RegisterRef::parse(text).is_some() {
            return Err(invalid("branch target must be a label"));
        }
        let target = labels
            .get(text)
            .copied()
            .ok_or_else(|| ParseError::UndefinedLabel {
                line,
                label: text.to_string(),
            })?;
        return Ok(Operand::Label {
            name: text.to_string(),
            target,
        });
    }

    if let Some(view) = RegisterRef::parse(text) {
        return Ok(Operand::Register(view));
    }

    let lowered = text.to_ascii_lowercase();
    if lowered.contains('[') {
        return parse_memory(&lowered)
            .map(Operand::Memory)
            .map_err(invalid);
    }

    parse_immediate(text)
        .map(Operand::Immediate)
        .ok_or_else(|| invalid("expected a register, memory reference or immediate"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Register;

    fn no_labels() -> HashMap<String, usize> {
        HashMap::new()
    }

    #[test]
    fn test_strip_comment() {
        assert_eq!(strip_comment("push rbp ## save"), "push rbp ");
        assert_eq!(strip_comment(";; EXPECT_STATUS: 13"), "");
        assert_eq!(strip_comment(".asciz \"a # b\" # c"), ".asciz \"a # b\" ");
        assert_eq!(strip_comment("ret"), "ret");
    }

    #[test]
    fn test_split_label_only_line() {
        let line = split_line(3, "_plus:                                  ## @plus");
        assert_eq!(line.number, 3);
        assert_eq!(line.labels, vec!["_plus"]);
        assert_eq!(line.body, None);
    }

    #[test]
    fn test_split_local_label_is_not_a_directive() {
        let line = split_line(1, ".LBB0_1:");
        assert_eq!(line.labels, vec![".LBB0_1"]);
        assert_eq!(line.body, None);
    }

    #[test]
    fn test_split_label_and_instruction() {
        let line = split_line(1, "loop: add eax, 1");
        assert_eq!(line.labels, vec!["loop"]);
        assert_eq!(
            line.body,
            Some(Body::Instruction {
                mnemonic: "add",
                operands: vec!["eax", "1"],
            })
        );
    }

    #[test]
    fn test_split_directive() {
        let line = split_line(1, "\t.section\t__TEXT,__text,regular,pure_instructions");
        assert_eq!(
            line.body,
            Some(Body::Directive {
                name: "section",
                args: vec!["__TEXT", "__text", "regular", "pure_instructions"],
            })
        );
    }

    #[test]
    fn test_split_instruction_with_memory_operand() {
        let line = split_line(1, "\tmov\tdword ptr [rbp - 4], edi");
        assert_eq!(
            line.body,
            Some(Body::Instruction {
                mnemonic: "mov",
                operands: vec!["dword ptr [rbp - 4]", "edi"],
            })
        );
    }

    #[test]
    fn test_parse_immediate() {
        assert_eq!(parse_immediate("13"), Some(13));
        assert_eq!(parse_immediate("-5"), Some(-5));
        assert_eq!(parse_immediate("0x2000001"), Some(0x200_0001));
        assert_eq!(parse_immediate("0xffffffffffffffff"), Some(-1));
        assert_eq!(parse_immediate("eax"), None);
        assert_eq!(parse_immediate(""), None);
    }

    #[test]
    fn test_parse_memory_operands() {
        assert_eq!(
            parse_memory("dword ptr [rbp - 20]"),
            Ok(MemoryRef {
                width: Some(Width::Dword),
                base: Some(Register::Rbp),
                displacement: -20,
            })
        );
        assert_eq!(
            parse_memory("[rsp+8]"),
            Ok(MemoryRef {
                width: None,
                base: Some(Register::Rsp),
                displacement: 8,
            })
        );
        assert_eq!(
            parse_memory("qword ptr [-8 + rbp + 2]"),
            Ok(MemoryRef {
                width: Some(Width::Qword),
                base: Some(Register::Rbp),
                displacement: -6,
            })
        );
        assert_eq!(
            parse_memory("byte ptr [0x100]"),
            Ok(MemoryRef {
                width: Some(Width::Byte),
                base: None,
                displacement: 0x100,
            })
        );
    }

    #[test]
    fn test_parse_memory_rejects_unsupported_forms() {
        assert!(parse_memory("tword ptr [rbp]").is_err());
        assert!(parse_memory("[rax*4]").is_err());
        assert!(parse_memory("[eax]").is_err());
        assert!(parse_memory("[8 - rbp]").is_err());
        assert!(parse_memory("[rbp + rax]").is_err());
        assert!(parse_memory("fs:[0x28]").is_err());
    }

    #[test]
    fn test_parse_operand_kinds() {
        let labels = no_labels();
        assert_eq!(
            parse_operand("EAX", Mnemonic::Mov, &labels, 1),
            Ok(Operand::Register(RegisterRef::dword(Register::Rax)))
        );
        assert_eq!(
            parse_operand("42", Mnemonic::Mov, &labels, 1),
            Ok(Operand::Immediate(42))
        );
        assert!(matches!(
            parse_operand("DWORD PTR [RBP - 4]", Mnemonic::Mov, &labels, 1),
            Ok(Operand::Memory(_))
        ));
        assert!(matches!(
            parse_operand("banana", Mnemonic::Mov, &labels, 7),
            Err(ParseError::InvalidOperand { line: 7, .. })
        ));
    }

    #[test]
    fn test_parse_branch_target() {
        let labels = HashMap::from([("fibonacci".to_string(), 4)]);
        assert_eq!(
            parse_operand("fibonacci", Mnemonic::Call, &labels, 1),
            Ok(Operand::Label {
                name: "fibonacci".to_string(),
                target: 4,
            })
        );
        assert_eq!(
            parse_operand("printf", Mnemonic::Call, &labels, 2),
            Err(ParseError::UndefinedLabel {
                line: 2,
                label: "printf".to_string(),
            })
        );
        assert!(matches!(
            parse_operand("rax", Mnemonic::Jmp, &labels, 3),
            Err(ParseError::InvalidOperand { line: 3, .. })
        ));
    }
}
