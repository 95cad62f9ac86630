use std::collections::BTreeSet;
use std::fmt;

use thiserror::Error;

use crate::chain::{Address, CallArg};
use crate::governance::proposal::{CanonicalPayload, ContractCall, ProposalDraft, ProposalVariant};

/// Why a single form field was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InvalidReason {
    Empty,
    Malformed,
    NonPositive,
    AlreadyMember,
}

impl fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            InvalidReason::Empty => "empty",
            InvalidReason::Malformed => "malformed",
            InvalidReason::NonPositive => "non-positive",
            InvalidReason::AlreadyMember => "already a member",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProposalError {
    /// Field-level rejection, so the form can highlight `field`.
    #[error("invalid proposal: {field} is {reason}")]
    InvalidProposal { field: &'static str, reason: InvalidReason },

    #[error("payload for `{0}` does not match any proposal variant")]
    UnrecognizedPayload(String),
}

fn invalid(field: &'static str, reason: InvalidReason) -> ProposalError {
    ProposalError::InvalidProposal { field, reason }
}

fn parse_address(field: &'static str, raw: &str) -> Result<Address, ProposalError> {
    if raw.trim().is_empty() {
        return Err(invalid(field, InvalidReason::Empty));
    }
    raw.parse().map_err(|_| invalid(field, InvalidReason::Malformed))
}

fn positive(field: &'static str, amount: u128) -> Result<u128, ProposalError> {
    if amount == 0 {
        return Err(invalid(field, InvalidReason::NonPositive));
    }
    Ok(amount)
}

/// Turns a [`ProposalDraft`] into a [`CanonicalPayload`].
///
/// Pure: the only outside input is the optionally known member set, used to
/// refuse `AddMember` for someone already in the DAO. Without it that check is
/// left to the contract.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProposalBuilder<'a> {
    known_members: Option<&'a BTreeSet<Address>>,
}

impl<'a> ProposalBuilder<'a> {
    pub fn new() -> Self {
        Self { known_members: None }
    }

    pub fn with_members(mut self, members: &'a BTreeSet<Address>) -> Self {
        self.known_members = Some(members);
        self
    }

    pub fn build(&self, draft: &ProposalDraft) -> Result<CanonicalPayload, ProposalError> {
        let mut args = self.variant_args(&draft.variant)?;

        let description = draft.description.trim();
        if description.is_empty() {
            return Err(invalid("description", InvalidReason::Empty));
        }
        args.push(CallArg::Text(description.to_string()));

        let kind = draft.variant.kind();
        Ok(CanonicalPayload {
            kind,
            description: description.to_string(),
            call: ContractCall {
                method: kind.method().to_string(),
                args,
                value: 0,
            },
        })
    }

    fn variant_args(&self, variant: &ProposalVariant) -> Result<Vec<CallArg>, ProposalError> {
        let args = match variant {
            ProposalVariant::SendToken { recipient, amount }
            | ProposalVariant::SendEther { recipient, amount } => {
                let to = parse_address("recipient", recipient)?;
                let amount = positive("amount", *amount)?;
                vec![CallArg::Address(to), CallArg::Uint(amount)]
            }
            ProposalVariant::AddMember { address, name } => {
                let addr = parse_address("address", address)?;
                if self.known_members.is_some_and(|members| members.contains(&addr)) {
                    return Err(invalid("address", InvalidReason::AlreadyMember));
                }
                vec![CallArg::Address(addr), CallArg::Text(name.trim().to_string())]
            }
            ProposalVariant::RemoveMember { address } => {
                vec![CallArg::Address(parse_address("address", address)?)]
            }
            ProposalVariant::MintNft { recipient, token_uri } => {
                let to = parse_address("recipient", recipient)?;
                let uri = token_uri.trim();
                if uri.is_empty() {
                    return Err(invalid("tokenURI", InvalidReason::Empty));
                }
                vec![CallArg::Address(to), CallArg::Text(uri.to_string())]
            }
            ProposalVariant::StoreValue { new_value } => vec![CallArg::Uint(*new_value)],
        };

        Ok(args)
    }
}
