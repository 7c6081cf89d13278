use crate::instructions::*;
use crate::machine::code_repo::*;
use crate::machine::machine_errors::*;

/// An operand the walker reports to its visitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Operand {
    Literal(Literal),
    Slot(u8),
    Call(PredId),
}

fn walk_expr(
    code: &[u8],
    mut pc: usize,
    walker: &mut impl FnMut(Operand) -> Result<(), ProgramError>,
) -> Result<usize, ProgramError> {
    loop {
        let operand = |pc| fetch(code, pc + 1).map_err(ProgramError::from);

        match fetch_opcode(code, pc)? {
            Opcode::PushSmallInt => pc += 2,
            Opcode::PushInt => {
                walker(Operand::Literal(Literal::Int(operand(pc)?)))?;
                pc += 2;
            }
            Opcode::PushFloat => {
                walker(Operand::Literal(Literal::Float(operand(pc)?)))?;
                pc += 2;
            }
            Opcode::PushObject => {
                walker(Operand::Literal(Literal::Object(operand(pc)?)))?;
                pc += 2;
            }
            Opcode::Load => {
                walker(Operand::Slot(operand(pc)?))?;
                pc += 2;
            }
            Opcode::Return => return Ok(pc + 1),
            op if op as u8 >= Opcode::PushSmallInt as u8 => pc += 1,
            op => {
                return Err(ProgramError::InvalidBytecode(format!(
                    "{} inside an expression at pc {}",
                    op, pc
                )))
            }
        }
    }
}

fn walk_arg(
    code: &[u8],
    pc: usize,
    side: Side,
    walker: &mut impl FnMut(Operand) -> Result<(), ProgramError>,
    misplaced: impl FnOnce() -> ProgramError,
) -> Result<usize, ProgramError> {
    let (instr, next) = decode_arg(code, pc, side).map_err(|_| misplaced())?;

    match instr {
        ArgInstr::Const(literal) => walker(Operand::Literal(literal))?,
        ArgInstr::FirstVar(slot) | ArgInstr::MatchVar(slot) => walker(Operand::Slot(slot))?,
        ArgInstr::Functional(start) => {
            walk_expr(code, start, &mut *walker)?;
        }
        ArgInstr::Void => {}
    }

    Ok(next)
}

fn walk_goal_args(
    code: &[u8],
    mut pc: usize,
    count: usize,
    what: impl Fn() -> String,
    walker: &mut impl FnMut(Operand) -> Result<(), ProgramError>,
) -> Result<usize, ProgramError> {
    for idx in 0..count {
        pc = walk_arg(code, pc, Side::Goal, &mut *walker, || ProgramError::ArityMismatch {
            what: what(),
            expected: count,
            found: idx,
        })?;
    }

    if let Ok(byte) = fetch(code, pc) {
        if Opcode::try_from(byte).map_or(false, Opcode::is_goal_arg) {
            return Err(ProgramError::ArityMismatch {
                what: what(),
                expected: count,
                found: count + 1,
            });
        }
    }

    Ok(pc)
}

/// Walks a clause from its head to its final `END`, passing every literal,
/// slot and callee to `walker`.
///
/// `arity_of` supplies callee arities, which determine how many argument
/// instructions follow each call.
pub(crate) fn walk_clause(
    code: &[u8],
    arity: usize,
    arity_of: impl Fn(PredId) -> Option<usize>,
    mut walker: impl FnMut(Operand) -> Result<(), ProgramError>,
) -> Result<(), ProgramError> {
    let mut pc = 0;

    for idx in 0..arity {
        pc = walk_arg(code, pc, Side::Head, &mut walker, || ProgramError::ArityMismatch {
            what: "clause head".to_string(),
            expected: arity,
            found: idx,
        })?;
    }

    loop {
        pc = match decode_goal(code, pc)? {
            GoalInstr::Call { pred, args, .. } => {
                let callee_arity = arity_of(pred).ok_or(ProgramError::UnknownPredicate(pred.0))?;
                walker(Operand::Call(pred))?;

                walk_goal_args(
                    code,
                    args,
                    callee_arity,
                    || format!("call to predicate #{}", pred.0),
                    &mut walker,
                )?
            }
            GoalInstr::Special { kind, args } => walk_goal_args(
                code,
                args,
                kind.arity(),
                || format!("call to {}/{}", kind.name(), kind.arity()),
                &mut walker,
            )?,
            GoalInstr::Builtin { op, operands } => match op.shape() {
                BuiltinShape::Slot => {
                    walker(Operand::Slot(fetch(code, operands)?))?;
                    operands + 1
                }
                BuiltinShape::TwoExprs => {
                    let pc = walk_expr(code, operands, &mut walker)?;
                    walk_expr(code, pc, &mut walker)?
                }
                BuiltinShape::SlotExpr => {
                    walker(Operand::Slot(fetch(code, operands)?))?;
                    walk_expr(code, operands + 1, &mut walker)?
                }
            },
            GoalInstr::Cut | GoalInstr::Fail => pc + 1,
            GoalInstr::End if pc + 1 == code.len() => return Ok(()),
            GoalInstr::End => {
                return Err(ProgramError::InvalidBytecode(format!(
                    "{} trailing bytes after end",
                    code.len() - pc - 1
                )))
            }
        };
    }
}

/// Checks clause bytecode against its predicate's pools and the program's
/// arities before it is allowed to run.
pub(crate) fn verify_clause(
    clause: &CompiledClause,
    pools: &ConstantPools,
    program: &Program,
) -> Result<(), ProgramError> {
    let env_size = clause.env_size;

    walk_clause(
        &clause.code,
        clause.arity,
        |pred| program.arity(pred),
        |operand| match operand {
            Operand::Literal(literal) if !pools.has(literal) => Err(ProgramError::InvalidBytecode(
                format!("{:?} is missing from the constant pools", literal),
            )),
            Operand::Slot(slot) if slot >= env_size => {
                Err(ProgramError::SlotOutOfRange { slot, env_size })
            }
            _ => Ok(()),
        },
    )
}
