use crate::instructions::*;
use crate::machine::code_repo::*;
use crate::machine::stack::*;
use crate::machine::Machine;
use crate::types::*;

use std::fmt;

/// One environment frame as it stood when an error was raised.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameDump {
    pub index: usize,
    pub predicate: String,
    /// The pc the frame will resume at, if known.
    pub pc: Option<usize>,
    pub instruction: String,
    pub source: Option<SourceLocation>,
    /// Variable names (or `_N` for unnamed slots) and their rendered values.
    pub variables: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChoicePointDump {
    pub callee: String,
    pub frame: Option<usize>,
    pub pc: usize,
    pub next: u32,
}

/// The head arguments of a frame that raised while its head was being
/// matched.
#[derive(Debug, Clone, PartialEq)]
pub struct HeadDump {
    pub predicate: String,
    pub matched: usize,
    pub args: Vec<String>,
}

/// A readable snapshot of the machine's stacks, attached to errors.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StackDump {
    /// Newest frame first.
    pub frames: Vec<FrameDump>,
    /// Newest choice point first.
    pub choice_points: Vec<ChoicePointDump>,
    pub pending_head: Option<HeadDump>,
}

impl fmt::Display for StackDump {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if let Some(head) = &self.pending_head {
            write!(f, "  while matching the head of {}(", head.predicate)?;

            for (i, arg) in head.args.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }

                write!(f, "{}", arg)?;
            }

            writeln!(f, ") at argument {}", head.matched + 1)?;
        }

        for frame in &self.frames {
            write!(f, "  #{} {}", frame.index, frame.predicate)?;

            if let Some(source) = &frame.source {
                write!(f, " ({})", source)?;
            }

            match frame.pc {
                Some(pc) => writeln!(f, " at {}: {}", pc, frame.instruction)?,
                None => writeln!(f)?,
            }

            for (name, value) in &frame.variables {
                writeln!(f, "      {} = {}", name, value)?;
            }
        }

        for cp in &self.choice_points {
            match cp.frame {
                Some(frame) => writeln!(
                    f,
                    "  choice point: {} alternative {} from #{} at {}",
                    cp.callee, cp.next, frame, cp.pc
                )?,
                None => writeln!(f, "  choice point: {} alternative {} (query)", cp.callee, cp.next)?,
            }
        }

        Ok(())
    }
}

fn describe(program: &Program, code: &[u8], pc: usize) -> String {
    match decode_goal(code, pc) {
        Ok(GoalInstr::Call { pred, tail, .. }) => {
            let op = if tail { "last_call" } else { "call" };
            format!("{} {}", op, program.name_of(pred))
        }
        Ok(GoalInstr::Cut) => "cut".to_string(),
        Ok(GoalInstr::End) => "end".to_string(),
        Ok(GoalInstr::Fail) => "fail".to_string(),
        Ok(GoalInstr::Special { kind, .. }) => format!("call_special {}", kind.name()),
        Ok(GoalInstr::Builtin { op, .. }) => format!("builtin {}", op.name()),
        Err(err) => format!("<{}>", err.kind()),
    }
}

fn slot_name(clause: &CompiledClause, slot: usize) -> String {
    match clause.var_name(slot) {
        Some(name) => name.to_string(),
        None => format!("_{}", slot),
    }
}

impl Machine {
    /// The pc frame `e` is executing or will resume at.
    fn frame_pc(&self, e: usize) -> Option<usize> {
        let st = &self.machine_st;

        if e == st.e {
            return Some(st.p);
        }

        st.env[e + 1..]
            .iter()
            .rev()
            .filter_map(|frame| frame.continuation)
            .find(|cont| cont.frame == e)
            .map(|cont| cont.pc)
    }

    fn dump_frame(&self, e: usize, frame: &Frame) -> FrameDump {
        let st = &self.machine_st;
        let clause = &frame.clause;
        let pc = self.frame_pc(e);

        let instruction = match pc {
            Some(pc) => describe(&self.program, &clause.code, pc),
            None => String::new(),
        };

        let variables = (0..clause.env_size as usize)
            .map(|slot| {
                let value = st.data.value(frame.base + slot as Addr);
                (slot_name(clause, slot), st.render(value))
            })
            .collect();

        FrameDump {
            index: e,
            predicate: self.program.name_of(frame.predicate),
            pc,
            instruction,
            source: clause.source.clone(),
            variables,
        }
    }

    fn dump_head(&self) -> Option<HeadDump> {
        let st = &self.machine_st;
        let progress = st.head_progress?;
        let frame = st.env.get(progress.frame)?;
        let model = frame.clause.head_model.as_ref()?;

        let args = model
            .iter()
            .map(|arg| match arg {
                HeadArgModel::Slot(slot) => slot_name(&frame.clause, *slot as usize),
                HeadArgModel::Constant(value) => st.render(*value),
                HeadArgModel::Void => "_".to_string(),
                HeadArgModel::Expression => "<expr>".to_string(),
            })
            .collect();

        Some(HeadDump {
            predicate: self.program.name_of(frame.predicate),
            matched: progress.matched,
            args,
        })
    }

    /// Snapshots the environment and choice-point stacks.
    pub fn stack_dump(&self) -> StackDump {
        let st = &self.machine_st;

        let frames = st
            .env
            .iter()
            .enumerate()
            .rev()
            .map(|(e, frame)| self.dump_frame(e, frame))
            .collect();

        let choice_points = st
            .choices
            .iter()
            .rev()
            .map(|cp| ChoicePointDump {
                callee: self.program.name_of(cp.callee),
                frame: cp.frame,
                pc: cp.pc,
                next: cp.next,
            })
            .collect();

        StackDump {
            frames,
            choice_points,
            pending_head: self.dump_head(),
        }
    }
}
