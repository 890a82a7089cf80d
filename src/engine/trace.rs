//! Human-readable calculation traces.

/// Ordered log of the arithmetic behind a result.
///
/// Each step carries the values involved so the computation can be redone
/// by hand from the trace alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CalculationTrace {
    steps: Vec<String>,
}

impl CalculationTrace {
    pub fn new() -> Self {
        Self { steps: Vec::new() }
    }

    pub fn step(&mut self, line: impl Into<String>) {
        self.steps.push(line.into());
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn into_steps(self) -> Vec<String> {
        self.steps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_steps_keep_order() {
        let mut trace = CalculationTrace::new();
        trace.step("first");
        trace.step(format!("second = {}", 2));
        assert_eq!(trace.len(), 2);
        assert_eq!(trace.into_steps(), vec!["first", "second = 2"]);
    }
}
