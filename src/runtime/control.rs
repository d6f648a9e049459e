//! Control-nesting stack for structured control flow
//!
//! Every `block`, `loop` and `if` pushes a [`ControlFrame`] recording its kind,
//! optional label and the position of the opening instruction. An `if` also
//! pushes a skip marker noting whether its then-branch was skipped; the marker
//! is popped together with the frame.
//!
//! Branch targets are not pre-resolved: the executor scans forward through the
//! instruction sequence for the matching `else`/`end` when it needs one.

use crate::parser::instruction::{Index, Instruction};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlKind {
    Block,
    /// Branches to a loop re-enter it instead of leaving it
    Loop,
    If,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ControlFrame {
    pub kind: ControlKind,
    pub label: Option<String>,
    /// Position of the opening instruction
    pub start: usize,
}

/// Outcome of resolving a branch operand against the open frames
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchTarget {
    /// Leave `depth + 1` frames
    Frame(u32),
    /// The function body itself: behaves as `return`
    Body,
}

#[derive(Debug, Default)]
pub struct ControlStack {
    frames: Vec<ControlFrame>,
    skips: Vec<bool>,
}

impl ControlStack {
    pub fn new() -> Self {
        ControlStack::default()
    }

    pub fn push(&mut self, frame: ControlFrame) {
        self.frames.push(frame);
    }

    /// Push an `if` frame together with its skip marker
    pub fn push_if(&mut self, frame: ControlFrame, skipped: bool) {
        self.frames.push(frame);
        self.skips.push(skipped);
    }

    /// Pop the innermost frame, and its skip marker if it is an `if`
    pub fn pop(&mut self) -> Option<ControlFrame> {
        let frame = self.frames.pop()?;
        if frame.kind == ControlKind::If {
            self.skips.pop();
        }
        Some(frame)
    }

    /// Pop `count` frames, innermost first
    pub fn pop_n(&mut self, count: usize) {
        for _ in 0..count {
            if self.pop().is_none() {
                break;
            }
        }
    }

    /// The frame `depth` levels out from the innermost (0 = innermost)
    pub fn get(&self, depth: u32) -> Option<&ControlFrame> {
        let len = self.frames.len();
        if depth as usize >= len {
            return None;
        }
        self.frames.get(len - 1 - depth as usize)
    }

    /// Whether the innermost `if` had its then-branch skipped
    pub fn skipping(&self) -> Option<bool> {
        self.skips.last().copied()
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Distance from the innermost frame to the nearest one carrying `label`
    pub fn find_label(&self, label: &str) -> Option<u32> {
        self.frames
            .iter()
            .rev()
            .position(|frame| frame.label.as_deref() == Some(label))
            .map(|depth| depth as u32)
    }

    /// Classify a numeric depth: in range, the function body, or invalid
    pub fn target(&self, depth: u32) -> Option<BranchTarget> {
        let open = self.frames.len();
        match (depth as usize).cmp(&open) {
            std::cmp::Ordering::Less => Some(BranchTarget::Frame(depth)),
            std::cmp::Ordering::Equal => Some(BranchTarget::Body),
            std::cmp::Ordering::Greater => None,
        }
    }

    /// Resolve a label operand to a depth; `None` if a `$name` is not open
    pub fn resolve(&self, index: &Index) -> Option<u32> {
        match index {
            Index::Num(depth) => Some(*depth),
            Index::Id(label) => self.find_label(label),
        }
    }
}

/// Position of the `end` that closes the `levels`-th construct enclosing
/// `from`, scanning forward. Constructs opened after `from` are skipped over.
pub fn find_end(body: &[Instruction], from: usize, levels: usize) -> Option<usize> {
    let mut nesting = 0usize;
    let mut remaining = levels;
    for (pos, instruction) in body.iter().enumerate().skip(from) {
        if instruction.opens_block() {
            nesting += 1;
        } else if *instruction == Instruction::End {
            if nesting == 0 {
                remaining -= 1;
                if remaining == 0 {
                    return Some(pos);
                }
            } else {
                nesting -= 1;
            }
        }
    }
    None
}

/// Where a skipped then-branch resumes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Branch {
    Else(usize),
    End(usize),
}

/// Find the `else` or `end` of the `if` whose then-branch starts at `from`
pub fn find_else_or_end(body: &[Instruction], from: usize) -> Option<Branch> {
    let mut nesting = 0usize;
    for (pos, instruction) in body.iter().enumerate().skip(from) {
        match instruction {
            i if i.opens_block() => nesting += 1,
            Instruction::Else if nesting == 0 => return Some(Branch::Else(pos)),
            Instruction::End if nesting == 0 => return Some(Branch::End(pos)),
            Instruction::End => nesting -= 1,
            _ => {}
        }
    }
    None
}
