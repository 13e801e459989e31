//! Fake [`CommandRunner`] for unit tests.

use crate::error::ExecError;
use crate::exec::{CommandRunner, render_command_line};
use std::sync::Mutex;

type Matcher = Box<dyn Fn(&str, &[String]) -> bool + Send + Sync>;
type Failure = Box<dyn Fn(String) -> ExecError + Send + Sync>;
type Effect = Box<dyn Fn(&str, &[String]) + Send + Sync>;

/// Records every invocation and succeeds unless a failure rule matches.
#[derive(Default)]
pub struct RecordingRunner {
    calls: Mutex<Vec<(String, Vec<String>)>>,
    failures: Vec<(Matcher, Failure)>,
    effects: Vec<Effect>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail invocations matching `matcher` with the error built by `failure`.
    pub fn fail_when(
        mut self,
        matcher: impl Fn(&str, &[String]) -> bool + Send + Sync + 'static,
        failure: impl Fn(String) -> ExecError + Send + Sync + 'static,
    ) -> Self {
        self.failures.push((Box::new(matcher), Box::new(failure)));
        self
    }

    /// Run `effect` on every successful invocation (e.g. to drop files a real tool would write).
    pub fn on_success(mut self, effect: impl Fn(&str, &[String]) + Send + Sync + 'static) -> Self {
        self.effects.push(Box::new(effect));
        self
    }

    pub fn calls(&self) -> Vec<(String, Vec<String>)> {
        self.calls.lock().unwrap().clone()
    }
}

impl CommandRunner for RecordingRunner {
    fn run(&self, program: &str, args: &[String]) -> Result<Vec<u8>, ExecError> {
        self.calls
            .lock()
            .unwrap()
            .push((program.to_string(), args.to_vec()));

        for (matcher, failure) in &self.failures {
            if matcher(program, args) {
                return Err(failure(render_command_line(program, args)));
            }
        }
        for effect in &self.effects {
            effect(program, args);
        }
        Ok(Vec::new())
    }
}
