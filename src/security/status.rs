//! Security status of a control connection and the AUTH/ADAT transition table.

use crate::security::state_machine::{Criterion, StateMachine, Transition, TransitionInput};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityStatus {
    Unauthenticated,
    NeedSecurityData,
    Authenticated,
}

impl fmt::Display for SecurityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SecurityStatus::Unauthenticated => "unauthenticated",
            SecurityStatus::NeedSecurityData => "need-security-data",
            SecurityStatus::Authenticated => "authenticated",
        };
        f.write_str(name)
    }
}

/// Named outcomes a security mechanism reports (RFC 2228 reply semantics).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityActionResult {
    /// 234: AUTH accepted, no data exchange needed.
    SecurityDataExchangeComplete,
    /// 235: ADAT finished the exchange.
    SecurityDataExchangeSuccessful,
    /// 334: AUTH accepted, ADAT expected.
    RequestedSecurityMechanismOkay,
    /// 335: ADAT accepted, more data expected.
    SecurityDataAcceptable,
}

impl SecurityActionResult {
    pub fn code(&self) -> u16 {
        match self {
            SecurityActionResult::SecurityDataExchangeComplete => 234,
            SecurityActionResult::SecurityDataExchangeSuccessful => 235,
            SecurityActionResult::RequestedSecurityMechanismOkay => 334,
            SecurityActionResult::SecurityDataAcceptable => 335,
        }
    }
}

use SecurityActionResult::*;
use SecurityStatus::*;

pub static SECURITY_TRANSITIONS: &[Transition<SecurityStatus, SecurityActionResult>] = &[
    Transition::new(Unauthenticated, Authenticated, "AUTH", Criterion::Result(SecurityDataExchangeComplete)),
    Transition::new(Unauthenticated, NeedSecurityData, "AUTH", Criterion::Result(RequestedSecurityMechanismOkay)),
    Transition::new(Unauthenticated, Unauthenticated, "AUTH", Criterion::CodeClass(4)),
    Transition::new(Unauthenticated, Unauthenticated, "AUTH", Criterion::CodeClass(5)),
    Transition::new(NeedSecurityData, Authenticated, "ADAT", Criterion::Result(SecurityDataExchangeSuccessful)),
    Transition::new(NeedSecurityData, NeedSecurityData, "ADAT", Criterion::Result(SecurityDataAcceptable)),
    Transition::new(NeedSecurityData, NeedSecurityData, "ADAT", Criterion::CodeClass(4)),
    Transition::new(NeedSecurityData, Unauthenticated, "ADAT", Criterion::CodeClass(5)),
];

pub type SecurityStateMachine = StateMachine<SecurityStatus, SecurityActionResult>;

pub fn security_state_machine() -> SecurityStateMachine {
    StateMachine::new(SECURITY_TRANSITIONS, Unauthenticated)
}

impl SecurityStateMachine {
    /// Feeds the reply a mechanism proposed for `command` into the machine.
    pub fn apply_reply(
        &mut self,
        command: &str,
        code: u16,
        result: Option<SecurityActionResult>,
    ) -> Result<SecurityStatus, crate::error::SecurityError> {
        self.apply(command, TransitionInput { code, result })
            .map_err(|e| crate::error::SecurityError::UnexpectedTransition {
                state: e.state.to_string(),
                command: e.command,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STATES: [SecurityStatus; 3] = [Unauthenticated, NeedSecurityData, Authenticated];
    const RESULTS: [Option<SecurityActionResult>; 5] = [
        None,
        Some(SecurityDataExchangeComplete),
        Some(SecurityDataExchangeSuccessful),
        Some(RequestedSecurityMechanismOkay),
        Some(SecurityDataAcceptable),
    ];

    fn in_table(state: SecurityStatus, command: &str, code: u16, result: Option<SecurityActionResult>) -> bool {
        SECURITY_TRANSITIONS.iter().any(|t| {
            t.from == state
                && t.command == command
                && match t.criterion {
                    Criterion::CodeClass(c) => u16::from(c) == code / 100,
                    Criterion::Result(r) => Some(r) == result,
                }
        })
    }

    fn machine_in(state: SecurityStatus) -> SecurityStateMachine {
        let mut machine = security_state_machine();
        match state {
            Unauthenticated => {}
            NeedSecurityData => {
                machine
                    .apply_reply("AUTH", 334, Some(RequestedSecurityMechanismOkay))
                    .unwrap();
            }
            Authenticated => {
                machine
                    .apply_reply("AUTH", 234, Some(SecurityDataExchangeComplete))
                    .unwrap();
            }
        }
        assert_eq!(machine.status(), state);
        machine
    }

    #[test]
    fn test_auth_completes_in_one_round_trip() {
        let mut machine = security_state_machine();
        let status = machine.apply_reply("AUTH", 234, Some(SecurityDataExchangeComplete));
        assert_eq!(status.unwrap(), Authenticated);
    }

    #[test]
    fn test_adat_rounds() {
        let mut machine = machine_in(NeedSecurityData);
        assert_eq!(
            machine.apply_reply("ADAT", 335, Some(SecurityDataAcceptable)).unwrap(),
            NeedSecurityData
        );
        assert_eq!(
            machine.apply_reply("ADAT", 235, Some(SecurityDataExchangeSuccessful)).unwrap(),
            Authenticated
        );
    }

    #[test]
    fn test_absent_triples_never_change_state() {
        let codes = [200, 234, 334, 431, 504, 535];
        for state in STATES {
            for command in ["AUTH", "ADAT", "PBSZ"] {
                for code in codes {
                    for result in RESULTS {
                        if in_table(state, command, code, result) {
                            continue;
                        }
                        let mut machine = machine_in(state);
                        assert!(machine.apply_reply(command, code, result).is_err());
                        assert_eq!(machine.status(), state);
                    }
                }
            }
        }
    }

    #[test]
    fn test_failed_adat_returns_to_unauthenticated() {
        let mut machine = machine_in(NeedSecurityData);
        assert_eq!(machine.apply_reply("ADAT", 535, None).unwrap(), Unauthenticated);
    }
}
