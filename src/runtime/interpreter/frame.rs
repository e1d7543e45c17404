use crate::runtime::heap::Value;

/// One invocation frame: operand stack and local-variable slots. Category-2
/// values occupy two slots; the second is `Padding`, so raw slot shuffles
/// (`dup2`, `pop2`) work without knowing the value category.
#[derive(Debug)]
pub struct Frame {
    pub locals: Vec<Value>,
    pub stack: Vec<Value>,
}

impl Frame {
    pub fn new(max_locals: usize, max_stack: usize) -> Self {
        Frame {
            locals: vec![Value::Padding; max_locals],
            stack: Vec::with_capacity(max_stack),
        }
    }

    /// Raw single-slot push.
    pub fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    /// Logical push: wide values get their padding slot.
    pub fn push_value(&mut self, value: Value) {
        let wide = value.is_wide();
        self.stack.push(value);
        if wide {
            self.stack.push(Value::Padding);
        }
    }

    /// Raw single-slot pop.
    pub fn pop(&mut self) -> Value {
        self.stack.pop().unwrap_or_else(|| panic!("operand stack underflow"))
    }

    /// Logical pop: skips the padding slot of a wide value.
    pub fn pop_value(&mut self) -> Value {
        match self.pop() {
            Value::Padding => self.pop(),
            value => value,
        }
    }

    pub fn pop_int(&mut self) -> i32 {
        self.pop().int()
    }

    pub fn pop_float(&mut self) -> f32 {
        self.pop().float()
    }

    pub fn pop_long(&mut self) -> i64 {
        self.pop_value().long()
    }

    pub fn pop_double(&mut self) -> f64 {
        self.pop_value().double()
    }

    pub fn pop_reference(&mut self) -> u32 {
        self.pop().reference()
    }

    pub fn get_local(&self, index: usize) -> Value {
        self.locals[index]
    }

    /// Logical store: wide values claim the following slot as padding.
    pub fn set_local(&mut self, index: usize, value: Value) {
        let wide = value.is_wide();
        self.locals[index] = value;
        if wide {
            self.locals[index + 1] = Value::Padding;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wide_values_span_two_slots() {
        let mut frame = Frame::new(4, 4);
        frame.push_value(Value::Long(7));
        assert_eq!(frame.stack.len(), 2);
        assert_eq!(frame.pop_long(), 7);
        assert!(frame.stack.is_empty());

        frame.set_local(1, Value::Double(2.5));
        assert_eq!(frame.get_local(1), Value::Double(2.5));
        assert_eq!(frame.get_local(2), Value::Padding);
    }
}
