//! Heap task object (spec §3, §4.5): a task's call stack and value
//! stack, addressed by index rather than pointer (spec §9) so that the
//! doubling growth below never invalidates a live reference the way a
//! reallocated `Vec` of pointers would.

use crate::heap::GcRef;
use crate::value::Value;

/// One call frame: which function is running, where its instruction
/// pointer sits within that function's bytecode, and where its local
/// slots begin in the task's shared value stack.
#[derive(Debug, Clone, Copy)]
pub struct Frame {
    pub function: GcRef,
    pub ip: usize,
    pub stack_base: usize,
}

#[derive(Debug, Clone)]
pub struct TaskObj {
    pub frames: Vec<Frame>,
    pub stack: Vec<Value>,
    pub sp: usize,
    max_frames: usize,
}

impl TaskObj {
    pub fn new(initial_stack_capacity: usize, max_frames: usize) -> Self {
        Self {
            frames: Vec::with_capacity(8),
            stack: vec![Value::Nil; initial_stack_capacity.max(1)],
            sp: 0,
            max_frames,
        }
    }

    pub fn current_frame(&self) -> Option<&Frame> {
        self.frames.last()
    }

    pub fn current_frame_mut(&mut self) -> Option<&mut Frame> {
        self.frames.last_mut()
    }

    /// Pushes a frame, doubling the call-stack capacity bookkeeping is
    /// implicit in `Vec::push`; the explicit depth check here is the
    /// one the spec asks be enforced independently of the allocator.
    pub fn push_frame(&mut self, frame: Frame) -> Result<(), usize> {
        if self.frames.len() >= self.max_frames {
            return Err(self.max_frames);
        }
        self.frames.push(frame);
        Ok(())
    }

    pub fn pop_frame(&mut self) -> Option<Frame> {
        self.frames.pop()
    }

    /// Ensures at least `needed` more slots exist above `self.sp`,
    /// doubling capacity (not just growing to fit) so repeated pushes
    /// amortize instead of reallocating every time (spec §9).
    pub fn ensure_stack_capacity(&mut self, needed: usize) {
        let required = self.sp + needed;
        if required > self.stack.len() {
            let mut new_len = self.stack.len().max(1);
            while new_len < required {
                new_len *= 2;
            }
            self.stack.resize(new_len, Value::Nil);
        }
    }

    pub fn push(&mut self, value: Value) {
        self.ensure_stack_capacity(1);
        self.stack[self.sp] = value;
        self.sp += 1;
    }

    pub fn pop(&mut self) -> Option<Value> {
        if self.sp == 0 {
            return None;
        }
        self.sp -= 1;
        Some(self.stack[self.sp])
    }

    pub fn peek(&self, depth_from_top: usize) -> Option<Value> {
        if depth_from_top >= self.sp {
            return None;
        }
        Some(self.stack[self.sp - 1 - depth_from_top])
    }

    pub fn approx_size(&self) -> usize {
        std::mem::size_of::<Self>()
            + self.stack.capacity() * std::mem::size_of::<Value>()
            + self.frames.capacity() * std::mem::size_of::<Frame>()
    }
}
