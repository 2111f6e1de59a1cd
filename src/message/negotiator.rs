use crate::config::{Features, TransferLimits, NUM_SCSIID};
use crate::message::Message;

/// Transfer agreement with one initiator
#[derive(Clone, Copy, Eq, PartialEq, Debug, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct NegotiatedParameters {
    /// Transfer period factor, meaningful only with a non-zero offset
    pub period: u8,
    /// REQ/ACK offset, zero for asynchronous
    pub offset: u8,
    /// Width exponent: 0 = 8 bit, 1 = 16 bit
    pub width: u8,
}

impl NegotiatedParameters {
    pub fn is_synchronous(&self) -> bool {
        self.offset > 0
    }
}

/// The target's answer to an SDTR / WDTR / PPR
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Response {
    /// Proposal is within limits, nothing is sent back
    Accept,
    /// Send this reduced proposal back
    Counter(Message),
    /// Send MESSAGE REJECT
    Reject,
}

/// Per target SDTR / WDTR / PPR state, keyed by initiator.
///
/// A round only changes the agreement on [`Negotiator::commit`];
/// [`Negotiator::reject`] drops the pending values and leaves the previous
/// agreement in place.
#[derive(Clone, Debug)]
pub struct Negotiator {
    agreed: [NegotiatedParameters; NUM_SCSIID],
    pending: Option<(u8, NegotiatedParameters)>,
    limits: TransferLimits,
    synchronous: bool,
}

impl Negotiator {
    pub fn new(limits: TransferLimits, features: &Features) -> Self {
        Self {
            agreed: [NegotiatedParameters::default(); NUM_SCSIID],
            pending: None,
            limits,
            synchronous: features.synchronous,
        }
    }

    fn clamp_sync(&self, period: u8, offset: u8) -> (u8, u8) {
        let offset = if self.synchronous {
            offset.min(self.limits.max_offset)
        } else {
            0
        };
        if offset == 0 {
            // asynchronous, the period is not used
            (period, 0)
        } else {
            (period.max(self.limits.min_period), offset)
        }
    }

    /// Starts a round with `message` from `initiator`
    pub fn propose(&mut self, initiator: u8, message: &Message) -> Response {
        let Some(current) = self.agreed.get(initiator as usize).copied() else {
            return Response::Reject;
        };
        let (pending, counter) = match *message {
            Message::Sdtr { period, offset } => {
                let (p, o) = self.clamp_sync(period, offset);
                let params = NegotiatedParameters {
                    period: p,
                    offset: o,
                    width: current.width,
                };
                let counter = (o != offset || p != period)
                    .then_some(Message::Sdtr { period: p, offset: o });
                (params, counter)
            }
            Message::Wdtr { width } => {
                let w = width.min(self.limits.max_width);
                // a width agreement resets the synchronous agreement
                let params = NegotiatedParameters {
                    period: 0,
                    offset: 0,
                    width: w,
                };
                (params, (w != width).then_some(Message::Wdtr { width: w }))
            }
            Message::Ppr {
                period,
                offset,
                width,
                options,
            } => {
                let (p, o) = self.clamp_sync(period, offset);
                let w = width.min(self.limits.max_width);
                let params = NegotiatedParameters {
                    period: p,
                    offset: o,
                    width: w,
                };
                // no protocol options (DT, IU, QAS) are supported
                let reduced = p != period || o != offset || w != width || options != 0;
                let counter = reduced.then_some(Message::Ppr {
                    period: p,
                    offset: o,
                    width: w,
                    options: 0,
                });
                (params, counter)
            }
            _ => return Response::Reject,
        };
        debug!(
            "negotiation with initiator {}: {:?} -> {:?}",
            initiator, message, pending
        );
        self.pending = Some((initiator, pending));
        match counter {
            Some(counter) => Response::Counter(counter),
            None => Response::Accept,
        }
    }

    /// Ends the round successfully, returning the new agreement
    pub fn commit(&mut self) -> Option<(u8, NegotiatedParameters)> {
        let (initiator, params) = self.pending.take()?;
        self.agreed[initiator as usize] = params;
        info!(
            "initiator {}: period {} offset {} width {}",
            initiator, params.period, params.offset, params.width
        );
        Some((initiator, params))
    }

    /// MESSAGE REJECT during the round, previous values stay
    pub fn reject(&mut self) {
        if let Some((initiator, _)) = self.pending.take() {
            debug!("negotiation with initiator {} rejected", initiator);
        }
    }

    #[cfg(test)]
    fn in_round(&self) -> bool {
        self.pending.is_some()
    }

    pub fn get(&self, initiator: u8) -> NegotiatedParameters {
        self.agreed
            .get(initiator as usize)
            .copied()
            .unwrap_or_default()
    }

    pub fn reset(&mut self, initiator: u8) {
        if let Some(params) = self.agreed.get_mut(initiator as usize) {
            *params = NegotiatedParameters::default();
        }
        if matches!(self.pending, Some((i, _)) if i == initiator) {
            self.pending = None;
        }
    }

    pub fn reset_all(&mut self) {
        self.agreed = [NegotiatedParameters::default(); NUM_SCSIID];
        self.pending = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sync_features() -> Features {
        Features {
            synchronous: true,
            ..Features::default()
        }
    }

    #[test]
    fn test_accept_within_limits_commits_silently() {
        let mut negotiator = Negotiator::new(TransferLimits::default(), &sync_features());
        let sdtr = Message::Sdtr {
            period: 50,
            offset: 8,
        };
        assert_eq!(negotiator.propose(7, &sdtr), Response::Accept);
        assert_eq!(negotiator.get(7), NegotiatedParameters::default());
        negotiator.commit();
        assert_eq!(
            negotiator.get(7),
            NegotiatedParameters {
                period: 50,
                offset: 8,
                width: 0
            }
        );
    }

    #[test]
    fn test_counter_proposal_clamps() {
        let mut negotiator = Negotiator::new(TransferLimits::default(), &sync_features());
        let sdtr = Message::Sdtr {
            period: 12,
            offset: 31,
        };
        assert_eq!(
            negotiator.propose(7, &sdtr),
            Response::Counter(Message::Sdtr {
                period: 50,
                offset: 15
            })
        );

        let negotiator_async = &mut Negotiator::new(TransferLimits::default(), &Features::default());
        assert_eq!(
            negotiator_async.propose(7, &sdtr),
            Response::Counter(Message::Sdtr {
                period: 12,
                offset: 0
            })
        );

        assert_eq!(
            negotiator.propose(7, &Message::Wdtr { width: 1 }),
            Response::Counter(Message::Wdtr { width: 0 })
        );
    }

    #[test]
    fn test_reject_restores_previous_values() {
        let mut negotiator = Negotiator::new(TransferLimits::default(), &sync_features());
        negotiator.propose(
            3,
            &Message::Sdtr {
                period: 50,
                offset: 4,
            },
        );
        negotiator.commit();
        let before = negotiator.get(3);

        for proposal in [
            Message::Sdtr {
                period: 10,
                offset: 15,
            },
            Message::Wdtr { width: 1 },
            Message::Ppr {
                period: 9,
                offset: 63,
                width: 1,
                options: 2,
            },
        ] {
            assert!(matches!(
                negotiator.propose(3, &proposal),
                Response::Counter(_)
            ));
            negotiator.reject();
            assert_eq!(negotiator.get(3), before);
            assert!(!negotiator.in_round());
        }
    }

    #[test]
    fn test_wdtr_resets_sync_and_reset_all() {
        let mut negotiator = Negotiator::new(
            TransferLimits {
                max_width: 1,
                ..TransferLimits::default()
            },
            &sync_features(),
        );
        negotiator.propose(
            1,
            &Message::Sdtr {
                period: 50,
                offset: 4,
            },
        );
        negotiator.commit();
        assert_eq!(negotiator.propose(1, &Message::Wdtr { width: 1 }), Response::Accept);
        negotiator.commit();
        assert_eq!(
            negotiator.get(1),
            NegotiatedParameters {
                period: 0,
                offset: 0,
                width: 1
            }
        );
        negotiator.reset_all();
        assert_eq!(negotiator.get(1), NegotiatedParameters::default());
        assert_eq!(negotiator.propose(1, &Message::Nop), Response::Reject);
    }
}
