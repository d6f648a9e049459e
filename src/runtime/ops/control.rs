//! Structured control flow
//!
//! Control operations reposition the program counter of the running
//! activation themselves. Matching `else`/`end` instructions are found by
//! scanning forward through the function body.
//!
//! Branches leave `depth + 1` control frames. A branch to a `loop` resumes at
//! the `loop` instruction itself, which pushes a fresh frame; any other target
//! resumes after its matching `end`. A depth equal to the number of open
//! frames targets the function body and returns.

use super::*;
use crate::parser::instruction::Index;
use crate::runtime::control::{find_else_or_end, find_end, Branch, BranchTarget, ControlFrame, ControlKind};
use crate::runtime::diagnostic::SymbolKind;
use crate::runtime::frame::Activation;

/// What the executor does after a control operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// End the activation
    Return,
}

pub type ControlResult = Result<(Flow, Option<Diagnostic>), RuntimeError>;

fn next(activation: &mut Activation) -> ControlResult {
    activation.pc += 1;
    Ok((Flow::Continue, None))
}

/// block / loop: open a frame at the current position
pub fn enter(activation: &mut Activation, kind: ControlKind, label: Option<&str>) -> ControlResult {
    activation.control.push(ControlFrame {
        kind,
        label: label.map(String::from),
        start: activation.pc,
    });
    next(activation)
}

/// if: pop the condition; when it is zero, resume in the else-branch or at the `end`
pub fn if_(activation: &mut Activation, label: Option<&str>) -> ControlResult {
    let condition = activation.stack.pop_i32()?;
    let frame = ControlFrame {
        kind: ControlKind::If,
        label: label.map(String::from),
        start: activation.pc,
    };

    if condition != 0 {
        activation.control.push_if(frame, false);
        return next(activation);
    }

    activation.control.push_if(frame, true);
    let body = &activation.function.body;
    activation.pc = match find_else_or_end(body, activation.pc + 1) {
        Some(Branch::Else(pos)) => pos + 1,
        // the `end` itself runs and closes the frame
        Some(Branch::End(pos)) => pos,
        None => body.len(),
    };
    Ok((Flow::Continue, None))
}

/// else: reached only at the end of a taken then-branch; skip to the `end`
pub fn else_(activation: &mut Activation) -> ControlResult {
    if activation.control.skipping() == Some(true) {
        return next(activation);
    }
    let body = &activation.function.body;
    activation.pc = find_end(body, activation.pc + 1, 1).unwrap_or(body.len());
    Ok((Flow::Continue, None))
}

/// end: close the innermost frame, or finish the function when none is open
pub fn end(activation: &mut Activation) -> ControlResult {
    if activation.control.pop().is_none() {
        return Ok((Flow::Return, None));
    }
    next(activation)
}

pub fn br(activation: &mut Activation, target: &Index) -> ControlResult {
    let (depth, unresolved) = match activation.control.resolve(target) {
        Some(depth) => (depth, None),
        None => (
            0,
            Some(Diagnostic::UnresolvedSymbol {
                kind: SymbolKind::Label,
                name: target.to_string(),
            }),
        ),
    };

    let (target, invalid) = match activation.control.target(depth) {
        Some(target) => (target, None),
        None => {
            let open = activation.control.depth();
            let fallback = if open == 0 {
                BranchTarget::Body
            } else {
                BranchTarget::Frame(0)
            };
            (fallback, Some(Diagnostic::InvalidBranchDepth { depth, open }))
        }
    };

    let flow = branch(activation, target);
    Ok((flow, unresolved.or(invalid)))
}

pub fn br_if(activation: &mut Activation, target: &Index) -> ControlResult {
    if activation.stack.pop_i32()? == 0 {
        return next(activation);
    }
    br(activation, target)
}

/// br_table: an out-of-range index selects the last (default) label.
/// An empty table branches to depth 0, like an unknown label.
pub fn br_table(activation: &mut Activation, targets: &[Index]) -> ControlResult {
    let index = activation.stack.pop_i32()? as u32 as usize;
    match targets.get(index).or(targets.last()) {
        Some(target) => br(activation, target),
        None => {
            let (flow, _) = br(activation, &Index::Num(0))?;
            Ok((
                flow,
                Some(Diagnostic::UnresolvedSymbol {
                    kind: SymbolKind::Label,
                    name: format!("br_table[{index}]"),
                }),
            ))
        }
    }
}

pub fn return_() -> ControlResult {
    Ok((Flow::Return, None))
}

fn branch(activation: &mut Activation, target: BranchTarget) -> Flow {
    let depth = match target {
        BranchTarget::Body => return Flow::Return,
        BranchTarget::Frame(depth) => depth,
    };

    let loop_start = activation
        .control
        .get(depth)
        .filter(|frame| frame.kind == ControlKind::Loop)
        .map(|frame| frame.start);

    let body = &activation.function.body;
    activation.pc = match loop_start {
        Some(start) => start,
        None => find_end(body, activation.pc + 1, depth as usize + 1).map_or(body.len(), |pos| pos + 1),
    };
    activation.control.pop_n(depth as usize + 1);
    Flow::Continue
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::instruction::{Instruction, IntBinOp, IntRelOp};
    use crate::parser::module::ValueType;
    use crate::runtime::test_utils::test::ExecutorTest;

    fn label(name: &str) -> Option<String> {
        Some(name.to_string())
    }

    fn id(name: &str) -> Index {
        Index::Id(name.into())
    }

    #[test]
    fn block_falls_through() {
        ExecutorTest::new()
            .inst(Instruction::Block { label: None })
            .inst(Instruction::I32Const { value: 1 })
            .inst(Instruction::End)
            .inst(Instruction::I32Const { value: 2 })
            .expect_stack(vec![Value::I32(1), Value::I32(2)]);
    }

    #[test]
    fn br_leaves_block() {
        ExecutorTest::new()
            .inst(Instruction::Block { label: None })
            .inst(Instruction::I32Const { value: 1 })
            .inst(Instruction::Br { target: Index::Num(0) })
            .inst(Instruction::I32Const { value: 99 })
            .inst(Instruction::End)
            .inst(Instruction::I32Const { value: 2 })
            .expect_stack(vec![Value::I32(1), Value::I32(2)]);
    }

    #[test]
    fn br_to_outer_label_leaves_both_blocks() {
        ExecutorTest::new()
            .inst(Instruction::Block { label: label("$a") })
            .inst(Instruction::Block { label: label("$b") })
            .inst(Instruction::Br { target: id("$a") })
            .inst(Instruction::I32Const { value: 1 })
            .inst(Instruction::End)
            .inst(Instruction::I32Const { value: 2 })
            .inst(Instruction::End)
            .inst(Instruction::I32Const { value: 3 })
            .expect_stack(vec![Value::I32(3)]);
    }

    #[test]
    fn br_to_inner_label_resumes_in_outer_block() {
        ExecutorTest::new()
            .inst(Instruction::Block { label: label("$a") })
            .inst(Instruction::Block { label: label("$b") })
            .inst(Instruction::Br { target: id("$b") })
            .inst(Instruction::I32Const { value: 1 })
            .inst(Instruction::End)
            .inst(Instruction::I32Const { value: 2 })
            .inst(Instruction::End)
            .inst(Instruction::I32Const { value: 3 })
            .expect_stack(vec![Value::I32(2), Value::I32(3)]);
    }

    #[test]
    fn loop_br_if_counts_down() {
        // $n = 3; loop { $n -= 1; $acc += 1; br_if $l ($n != 0) }
        ExecutorTest::new()
            .param("$n", ValueType::I32)
            .args(vec![Value::I32(3)])
            .inst(Instruction::Local {
                name: Some("$acc".into()),
                ty: ValueType::I32,
            })
            .inst(Instruction::Loop { label: label("$l") })
            .inst(Instruction::LocalGet { local: id("$n") })
            .inst(Instruction::I32Const { value: 1 })
            .inst(Instruction::I32Binary(IntBinOp::Sub))
            .inst(Instruction::LocalSet { local: id("$n") })
            .inst(Instruction::LocalGet { local: id("$acc") })
            .inst(Instruction::I32Const { value: 1 })
            .inst(Instruction::I32Binary(IntBinOp::Add))
            .inst(Instruction::LocalSet { local: id("$acc") })
            .inst(Instruction::LocalGet { local: id("$n") })
            .inst(Instruction::BrIf { target: id("$l") })
            .inst(Instruction::End)
            .inst(Instruction::LocalGet { local: id("$acc") })
            .expect_stack(vec![Value::I32(3)]);
    }

    #[test]
    fn br_if_not_taken_falls_through() {
        ExecutorTest::new()
            .inst(Instruction::Block { label: None })
            .inst(Instruction::I32Const { value: 0 })
            .inst(Instruction::BrIf { target: Index::Num(0) })
            .inst(Instruction::I32Const { value: 7 })
            .inst(Instruction::End)
            .expect_stack(vec![Value::I32(7)]);
    }

    #[test]
    fn if_else_takes_then_branch() {
        ExecutorTest::new()
            .inst(Instruction::I32Const { value: 1 })
            .inst(Instruction::If { label: None })
            .inst(Instruction::I32Const { value: 10 })
            .inst(Instruction::Else)
            .inst(Instruction::I32Const { value: 20 })
            .inst(Instruction::End)
            .inst(Instruction::I32Const { value: 30 })
            .expect_stack(vec![Value::I32(10), Value::I32(30)]);
    }

    #[test]
    fn if_else_takes_else_branch() {
        ExecutorTest::new()
            .inst(Instruction::I32Const { value: 0 })
            .inst(Instruction::If { label: None })
            .inst(Instruction::I32Const { value: 10 })
            .inst(Instruction::Else)
            .inst(Instruction::I32Const { value: 20 })
            .inst(Instruction::End)
            .inst(Instruction::I32Const { value: 30 })
            .expect_stack(vec![Value::I32(20), Value::I32(30)]);
    }

    #[test]
    fn if_without_else_skips_body() {
        ExecutorTest::new()
            .inst(Instruction::I32Const { value: 0 })
            .inst(Instruction::If { label: None })
            .inst(Instruction::I32Const { value: 10 })
            .inst(Instruction::End)
            .inst(Instruction::I32Const { value: 30 })
            .expect_stack(vec![Value::I32(30)]);
    }

    #[test]
    fn nested_if_in_skipped_branch() {
        ExecutorTest::new()
            .inst(Instruction::I32Const { value: 0 })
            .inst(Instruction::If { label: None })
            .inst(Instruction::I32Const { value: 1 })
            .inst(Instruction::If { label: None })
            .inst(Instruction::I32Const { value: 10 })
            .inst(Instruction::Else)
            .inst(Instruction::I32Const { value: 11 })
            .inst(Instruction::End)
            .inst(Instruction::Else)
            .inst(Instruction::I32Const { value: 20 })
            .inst(Instruction::End)
            .expect_stack(vec![Value::I32(20)]);
    }

    #[test]
    fn br_out_of_if_counts_the_if_frame() {
        ExecutorTest::new()
            .inst(Instruction::Block { label: None })
            .inst(Instruction::I32Const { value: 1 })
            .inst(Instruction::If { label: None })
            .inst(Instruction::Br { target: Index::Num(1) })
            .inst(Instruction::Else)
            .inst(Instruction::I32Const { value: 5 })
            .inst(Instruction::End)
            .inst(Instruction::I32Const { value: 6 })
            .inst(Instruction::End)
            .inst(Instruction::I32Const { value: 7 })
            .expect_stack(vec![Value::I32(7)]);
    }

    #[test]
    fn br_table_selects_and_defaults() {
        // block $outer / block $inner / br_table $inner $outer (index) / end / push 1 / end / push 2
        let program = |index: i32| {
            ExecutorTest::new()
                .inst(Instruction::Block { label: label("$outer") })
                .inst(Instruction::Block { label: label("$inner") })
                .inst(Instruction::I32Const { value: index })
                .inst(Instruction::BrTable {
                    targets: vec![id("$inner"), id("$outer")],
                })
                .inst(Instruction::End)
                .inst(Instruction::I32Const { value: 1 })
                .inst(Instruction::End)
                .inst(Instruction::I32Const { value: 2 })
        };
        program(0).expect_stack(vec![Value::I32(1), Value::I32(2)]);
        program(1).expect_stack(vec![Value::I32(2)]);
        program(5).expect_stack(vec![Value::I32(2)]);
        program(-1).expect_stack(vec![Value::I32(2)]);
    }

    #[test]
    fn br_table_without_targets_leaves_innermost_block() {
        ExecutorTest::new()
            .inst(Instruction::Block { label: None })
            .inst(Instruction::I32Const { value: 5 })
            .inst(Instruction::BrTable { targets: vec![] })
            .inst(Instruction::I32Const { value: 1 })
            .inst(Instruction::End)
            .inst(Instruction::I32Const { value: 2 })
            .expect_diagnostic(Diagnostic::UnresolvedSymbol {
                kind: SymbolKind::Label,
                name: "br_table[5]".into(),
            })
            .expect_stack(vec![Value::I32(2)]);
    }

    #[test]
    fn return_stops_execution() {
        ExecutorTest::new()
            .inst(Instruction::I32Const { value: 1 })
            .inst(Instruction::Block { label: None })
            .inst(Instruction::Return)
            .inst(Instruction::End)
            .inst(Instruction::I32Const { value: 2 })
            .expect_stack(vec![Value::I32(1)]);
    }

    #[test]
    fn br_to_function_body_returns() {
        ExecutorTest::new()
            .inst(Instruction::Block { label: None })
            .inst(Instruction::I32Const { value: 4 })
            .inst(Instruction::Br { target: Index::Num(1) })
            .inst(Instruction::End)
            .inst(Instruction::I32Const { value: 5 })
            .expect_stack(vec![Value::I32(4)]);
    }

    #[test]
    fn unknown_label_falls_back_to_innermost() {
        ExecutorTest::new()
            .inst(Instruction::Block { label: label("$a") })
            .inst(Instruction::Br { target: id("$missing") })
            .inst(Instruction::I32Const { value: 1 })
            .inst(Instruction::End)
            .inst(Instruction::I32Const { value: 2 })
            .expect_diagnostic(Diagnostic::UnresolvedSymbol {
                kind: SymbolKind::Label,
                name: "$missing".into(),
            })
            .expect_stack(vec![Value::I32(2)]);
    }

    #[test]
    fn excessive_depth_falls_back_to_innermost() {
        ExecutorTest::new()
            .inst(Instruction::Block { label: None })
            .inst(Instruction::Br { target: Index::Num(5) })
            .inst(Instruction::I32Const { value: 1 })
            .inst(Instruction::End)
            .inst(Instruction::I32Const { value: 2 })
            .expect_diagnostic(Diagnostic::InvalidBranchDepth { depth: 5, open: 1 })
            .expect_stack(vec![Value::I32(2)]);
    }

    #[test]
    fn loop_with_counter_and_exit_block() {
        // sum 1..=4 using block/loop with br_if to exit and br to continue
        ExecutorTest::new()
            .inst(Instruction::Local {
                name: Some("$i".into()),
                ty: ValueType::I32,
            })
            .inst(Instruction::Local {
                name: Some("$sum".into()),
                ty: ValueType::I32,
            })
            .inst(Instruction::Block { label: label("$done") })
            .inst(Instruction::Loop { label: label("$next") })
            .inst(Instruction::LocalGet { local: id("$i") })
            .inst(Instruction::I32Const { value: 4 })
            .inst(Instruction::I32Compare(IntRelOp::GeS))
            .inst(Instruction::BrIf { target: id("$done") })
            .inst(Instruction::LocalGet { local: id("$i") })
            .inst(Instruction::I32Const { value: 1 })
            .inst(Instruction::I32Binary(IntBinOp::Add))
            .inst(Instruction::LocalTee { local: id("$i") })
            .inst(Instruction::LocalGet { local: id("$sum") })
            .inst(Instruction::I32Binary(IntBinOp::Add))
            .inst(Instruction::LocalSet { local: id("$sum") })
            .inst(Instruction::Br { target: id("$next") })
            .inst(Instruction::End)
            .inst(Instruction::End)
            .inst(Instruction::LocalGet { local: id("$sum") })
            .expect_stack(vec![Value::I32(10)]);
    }

    #[test]
    fn if_condition_must_be_i32() {
        ExecutorTest::new()
            .inst(Instruction::F32Const { value: 1.0 })
            .inst(Instruction::If { label: None })
            .inst(Instruction::End)
            .expect_error("Type mismatch");
    }
}
