use crate::jvm::{StackMapFrame, Type};

/// Locals and stack can change by at most this much between an `append`/`chop` frame and its
/// predecessor (exclusive)
const MAX_LOCAL_LENGTH_DIFF: usize = 4;

/// Uncompressed frame captured at an entry point
///
/// Locals are compacted: a wide local occupies one entry, and a `None` entry stands for an
/// unusable register below the last defined one. The stack likewise holds one entry per value.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameRecord {
    pub pc: usize,
    pub locals: Vec<Option<Type>>,
    pub stack: Vec<Type>,
}

/// Type as the verifier compares it: every sub-int type is just `int`
pub fn verifier_view(ty: &Type) -> Type {
    match ty {
        Type::Base(base) if base.is_int_like() => Type::INT,
        other => other.clone(),
    }
}

/// Length difference `previous - current` if `current` and `previous` agree on their common
/// prefix and are close enough in length for an `append` or `chop` frame
fn compare_locals(previous: &[Option<Type>], current: &[Option<Type>]) -> Option<isize> {
    let diff = previous.len() as isize - current.len() as isize;
    if diff.unsigned_abs() > MAX_LOCAL_LENGTH_DIFF {
        return None;
    }
    if previous.iter().zip(current).all(|(p, c)| p == c) {
        Some(diff)
    } else {
        None
    }
}

/// Choose the most compact encoding of `current` given the frame before it
pub fn compress_frame(previous: &FrameRecord, current: &FrameRecord) -> StackMapFrame<Option<Type>> {
    let prev_pc = if previous.pc == usize::MAX { -1 } else { previous.pc as i64 };
    let delta = current.pc as i64 - prev_pc - 1;
    let offset_delta = u16::try_from(delta).unwrap_or(u16::MAX);

    match (compare_locals(&previous.locals, &current.locals), current.stack.len()) {
        (Some(0), 0) => return StackMapFrame::SameLocalsNoStack { offset_delta },
        (Some(0), 1) => {
            return StackMapFrame::SameLocalsOneStack {
                offset_delta,
                stack: Some(current.stack[0].clone()),
            }
        }
        (Some(diff), 0) if diff < 0 && diff.unsigned_abs() < MAX_LOCAL_LENGTH_DIFF => {
            return StackMapFrame::AppendLocalsNoStack {
                offset_delta,
                locals: current.locals[previous.locals.len()..].to_vec(),
            }
        }
        (Some(diff), 0) if diff > 0 && (diff as usize) < MAX_LOCAL_LENGTH_DIFF => {
            return StackMapFrame::ChopLocalsNoStack {
                offset_delta,
                chopped_k: diff as u8,
            }
        }
        _ => (),
    }
    StackMapFrame::Full {
        offset_delta,
        locals: current.locals.clone(),
        stack: current.stack.iter().cloned().map(Some).collect(),
    }
}

/// Compress a method's frames, the first being diffed against the implicit initial frame
pub fn compress_frames(
    initial: &FrameRecord,
    frames: &[FrameRecord],
) -> Vec<StackMapFrame<Option<Type>>> {
    let mut previous = initial;
    let mut compressed = Vec::with_capacity(frames.len());
    for frame in frames {
        compressed.push(compress_frame(previous, frame));
        previous = frame;
    }
    compressed
}
