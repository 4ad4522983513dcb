//! Table-driven state machine
//!
//! A small finite-state machine whose transitions are keyed by a command
//! name and a result tag. The tag is either the class (first digit) of the
//! reply code proposed by a handler, or a named result symbol. Lookup walks
//! the static table in order and takes the first matching entry; when none
//! matches the state is left untouched and the caller gets an error.

use std::fmt;

/// What a transition matches on besides state and command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Criterion<R> {
    /// First digit of the reply code, e.g. `5` for any 5xx reply.
    CodeClass(u8),
    /// A named result produced by the command's handler.
    Result(R),
}

/// One row of a transition table.
#[derive(Debug, Clone, Copy)]
pub struct Transition<S, R> {
    pub from: S,
    pub to: S,
    pub command: &'static str,
    pub criterion: Criterion<R>,
}

impl<S, R> Transition<S, R> {
    pub const fn new(from: S, to: S, command: &'static str, criterion: Criterion<R>) -> Self {
        Self {
            from,
            to,
            command,
            criterion,
        }
    }
}

/// Input fed to the machine after a handler ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionInput<R> {
    pub code: u16,
    pub result: Option<R>,
}

/// Returned when no table entry covers (state, command, input).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidTransition<S> {
    pub state: S,
    pub command: String,
    pub code: u16,
}

impl<S: fmt::Debug> fmt::Display for InvalidTransition<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "no transition from {:?} for {} with reply {}",
            self.state, self.command, self.code
        )
    }
}

impl<S: fmt::Debug> std::error::Error for InvalidTransition<S> {}

pub struct StateMachine<S: 'static, R: 'static> {
    table: &'static [Transition<S, R>],
    initial: S,
    current: S,
}

impl<S, R> StateMachine<S, R>
where
    S: Copy + Eq + fmt::Debug,
    R: Copy + Eq,
{
    pub fn new(table: &'static [Transition<S, R>], initial: S) -> Self {
        Self {
            table,
            initial,
            current: initial,
        }
    }

    pub fn status(&self) -> S {
        self.current
    }

    /// Returns to the initial state (REIN).
    pub fn reset(&mut self) {
        self.current = self.initial;
    }

    /// Whether the current state has any transition for `command`.
    pub fn accepts(&self, command: &str) -> bool {
        self.table
            .iter()
            .any(|t| t.from == self.current && t.command.eq_ignore_ascii_case(command))
    }

    /// Moves to the target of the first matching transition.
    pub fn apply(
        &mut self,
        command: &str,
        input: TransitionInput<R>,
    ) -> Result<S, InvalidTransition<S>> {
        let found = self.table.iter().find(|t| {
            t.from == self.current
                && t.command.eq_ignore_ascii_case(command)
                && match t.criterion {
                    Criterion::CodeClass(class) => u16::from(class) == input.code / 100,
                    Criterion::Result(result) => input.result == Some(result),
                }
        });

        match found {
            Some(transition) => {
                self.current = transition.to;
                Ok(self.current)
            }
            None => Err(InvalidTransition {
                state: self.current,
                command: command.to_ascii_uppercase(),
                code: input.code,
            }),
        }
    }
}

impl<S: fmt::Debug, R> fmt::Debug for StateMachine<S, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateMachine")
            .field("current", &self.current)
            .field("transitions", &self.table.len())
            .finish()
    }
}
