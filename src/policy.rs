use crate::effects::{Effect, URGENT_VIBRATION_PATTERN};
use crate::history::UrgencyResult;
use crate::models::{CallStatus, CallerId};
use crate::settings::Settings;

/// Outcome of the disposition policy for one resolved call. Deterministic
/// given its inputs; the policy itself performs no I/O.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Record this status now and request the listed effects.
    Settle {
        status: CallStatus,
        effects: Vec<Effect>,
    },
    /// Prompt the driver and wait for a recognized voice command before
    /// settling.
    AwaitVoice { effects: Vec<Effect> },
}

/// What a recognized voice command asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceAction {
    Accept,
    Decline,
}

/// Combines classifier output, VIP membership, and user settings into one
/// disposition. First matching rule wins:
/// VIP bypass, then urgent repeat, then first-contact handling.
pub fn decide(caller: &CallerId, urgency: &UrgencyResult, settings: &Settings) -> Decision {
    if caller.is_known() && settings.is_vip(caller) {
        // Whitelisted callers ring through untouched, urgent or not.
        return Decision::Settle {
            status: CallStatus::VipIgnored,
            effects: Vec::new(),
        };
    }

    if urgency.is_urgent {
        // A repeat caller already heard no answer and is calling back on
        // purpose; alert the driver instead of texting them again.
        return Decision::Settle {
            status: CallStatus::UrgentAlert,
            effects: vec![
                Effect::LocalAlert {
                    caller: caller.clone(),
                },
                Effect::Vibrate {
                    pattern: URGENT_VIBRATION_PATTERN.to_vec(),
                },
                Effect::Notification {
                    title: "Urgent repeat call".to_string(),
                    body: format!("{caller} called again while you were driving"),
                },
            ],
        };
    }

    match caller {
        CallerId::Known(number) => {
            if settings.voice_confirm {
                // Voice confirmation strictly overrides auto-decline.
                return Decision::AwaitVoice {
                    effects: vec![
                        Effect::Speak {
                            text: format!(
                                "Incoming call from {number}. Say answer or decline."
                            ),
                        },
                        Effect::CaptureVoice,
                    ],
                };
            }

            let sms = Effect::SendSms {
                to: number.clone(),
                body: settings.auto_reply_message.clone(),
            };
            if settings.auto_decline {
                Decision::Settle {
                    status: CallStatus::DeclinedAndReplied,
                    effects: vec![Effect::DeclineCall, sms],
                }
            } else {
                Decision::Settle {
                    status: CallStatus::Replied,
                    effects: vec![sms],
                }
            }
        }
        // No address to send an SMS to.
        CallerId::Unknown => {
            if settings.auto_decline {
                Decision::Settle {
                    status: CallStatus::Declined,
                    effects: vec![Effect::DeclineCall],
                }
            } else {
                Decision::Settle {
                    status: CallStatus::Ignored,
                    effects: Vec::new(),
                }
            }
        }
    }
}

/// Matches a free-text transcript against the accepted command phrases by
/// case-insensitive substring. Accept phrases are checked first.
pub fn match_voice_command(transcript: &str) -> Option<VoiceAction> {
    let lowered = transcript.to_lowercase();
    if lowered.contains("answer") || lowered.contains("accept") {
        return Some(VoiceAction::Accept);
    }
    if lowered.contains("decline") || lowered.contains("reject") || lowered.contains("no") {
        return Some(VoiceAction::Decline);
    }
    None
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::history::{classify, CallHistory};

    fn urgency(caller: &CallerId, is_urgent: bool) -> UrgencyResult {
        UrgencyResult {
            caller: caller.clone(),
            is_urgent,
            is_first_contact: !is_urgent,
        }
    }

    #[test]
    fn vip_bypass_wins_even_when_urgent() {
        let caller = CallerId::Known("+15551234567".into());
        let mut settings = Settings::default();
        settings.vip_numbers.push("5551234567".into());

        let decision = decide(&caller, &urgency(&caller, true), &settings);
        assert_eq!(
            decision,
            Decision::Settle {
                status: CallStatus::VipIgnored,
                effects: Vec::new(),
            }
        );
    }

    #[test]
    fn urgent_repeat_alerts_without_sms() {
        let caller = CallerId::Known("5551234567".into());
        let settings = Settings::default();

        let decision = decide(&caller, &urgency(&caller, true), &settings);
        let Decision::Settle { status, effects } = decision else {
            panic!("urgent repeat must settle immediately");
        };
        assert_eq!(status, CallStatus::UrgentAlert);
        assert!(effects
            .iter()
            .any(|e| matches!(e, Effect::LocalAlert { .. })));
        assert!(effects.iter().any(|e| matches!(e, Effect::Vibrate { .. })));
        assert!(!effects.iter().any(|e| matches!(e, Effect::SendSms { .. })));
    }

    #[test]
    fn first_contact_gets_auto_reply() {
        let caller = CallerId::Known("5551234567".into());
        let settings = Settings::default();

        let decision = decide(&caller, &urgency(&caller, false), &settings);
        let Decision::Settle { status, effects } = decision else {
            panic!("first contact must settle immediately");
        };
        assert_eq!(status, CallStatus::Replied);
        assert_eq!(
            effects,
            vec![Effect::SendSms {
                to: "5551234567".into(),
                body: settings.auto_reply_message.clone(),
            }]
        );
    }

    #[test]
    fn auto_decline_declines_then_replies() {
        let caller = CallerId::Known("5551234567".into());
        let settings = Settings {
            auto_decline: true,
            ..Settings::default()
        };

        let decision = decide(&caller, &urgency(&caller, false), &settings);
        let Decision::Settle { status, effects } = decision else {
            panic!("expected settled decision");
        };
        assert_eq!(status, CallStatus::DeclinedAndReplied);
        assert_eq!(effects[0], Effect::DeclineCall);
        assert!(matches!(effects[1], Effect::SendSms { .. }));
    }

    #[test]
    fn voice_confirm_overrides_auto_decline() {
        let caller = CallerId::Known("5551234567".into());
        let settings = Settings {
            auto_decline: true,
            voice_confirm: true,
            ..Settings::default()
        };

        let decision = decide(&caller, &urgency(&caller, false), &settings);
        let Decision::AwaitVoice { effects } = decision else {
            panic!("voice confirm must defer the decision");
        };
        assert!(matches!(effects[0], Effect::Speak { .. }));
        assert_eq!(effects[1], Effect::CaptureVoice);
    }

    #[test]
    fn unknown_first_contact_is_logged_or_declined() {
        let settings = Settings::default();
        let decision = decide(
            &CallerId::Unknown,
            &urgency(&CallerId::Unknown, false),
            &settings,
        );
        assert_eq!(
            decision,
            Decision::Settle {
                status: CallStatus::Ignored,
                effects: Vec::new(),
            }
        );

        let declining = Settings {
            auto_decline: true,
            ..Settings::default()
        };
        let decision = decide(
            &CallerId::Unknown,
            &urgency(&CallerId::Unknown, false),
            &declining,
        );
        assert_eq!(
            decision,
            Decision::Settle {
                status: CallStatus::Declined,
                effects: vec![Effect::DeclineCall],
            }
        );
    }

    #[test]
    fn classifier_and_policy_agree_on_urgent_repeat() {
        let caller = CallerId::Known("5551234567".into());
        let mut history = CallHistory::new();
        let base = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let settings = Settings::default();

        classify(&mut history, &caller, base, 120_000);
        let repeat = classify(
            &mut history,
            &caller,
            base + chrono::Duration::seconds(60),
            120_000,
        );

        let Decision::Settle { status, .. } = decide(&caller, &repeat, &settings) else {
            panic!("expected settled decision");
        };
        assert_eq!(status, CallStatus::UrgentAlert);
    }

    #[test]
    fn voice_commands_match_by_substring() {
        assert_eq!(
            match_voice_command("please answer it"),
            Some(VoiceAction::Accept)
        );
        assert_eq!(match_voice_command("ACCEPT"), Some(VoiceAction::Accept));
        assert_eq!(
            match_voice_command("decline that"),
            Some(VoiceAction::Decline)
        );
        assert_eq!(match_voice_command("reject"), Some(VoiceAction::Decline));
        assert_eq!(match_voice_command("no thanks"), Some(VoiceAction::Decline));
        assert_eq!(match_voice_command("hmm maybe later"), None);
    }
}
