//! ICE negotiation state.

/// Where a transport stands in offer/answer negotiation.
///
/// ```text
/// Disabled --GetCandidates(offer)--> Offering --SetCandidates--> OfferAnswered
/// Disabled --SetCandidates---------> Answering
/// Answering | OfferAnswered --USE-CANDIDATE--> Completed
/// Completed --SetCandidates(new credentials)--> Answering
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IceState {
    /// No credentials from the peer, ICE not in use
    #[default]
    Disabled,
    /// Local offer sent, waiting for the answer
    Offering,
    /// Remote offer received, waiting for a nomination
    Answering,
    /// Answer to our offer received, waiting for a nomination
    OfferAnswered,
    /// A candidate has been nominated
    Completed,
}

impl IceState {
    /// Offer/answer in flight: checks are expected but nothing is selected yet.
    pub fn is_negotiating(self) -> bool {
        matches!(
            self,
            IceState::Offering | IceState::Answering | IceState::OfferAnswered
        )
    }
}

impl std::fmt::Display for IceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disabled => write!(f, "disabled"),
            Self::Offering => write!(f, "offering"),
            Self::Answering => write!(f, "answering"),
            Self::OfferAnswered => write!(f, "offer-answered"),
            Self::Completed => write!(f, "completed"),
        }
    }
}

/// STUN role, derived whenever remote credentials are applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IceRole {
    #[default]
    Lite,
    Controlled,
    Controlling,
}
