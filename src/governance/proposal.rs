use std::fmt;

use serde::{Deserialize, Serialize};

use crate::chain::{Address, CallArg, TxRequest};
use crate::governance::ProposalError;

/// Raw user input for one governance action, as collected by a form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ProposalVariant {
    SendToken { recipient: String, amount: u128 },
    SendEther { recipient: String, amount: u128 },
    AddMember { address: String, name: String },
    RemoveMember { address: String },
    MintNft { recipient: String, token_uri: String },
    /// Store a new value in the governed box contract.
    StoreValue { new_value: u128 },
}

impl ProposalVariant {
    pub fn kind(&self) -> ProposalKind {
        match self {
            ProposalVariant::SendToken { .. } => ProposalKind::SendToken,
            ProposalVariant::SendEther { .. } => ProposalKind::SendEther,
            ProposalVariant::AddMember { .. } => ProposalKind::AddMember,
            ProposalVariant::RemoveMember { .. } => ProposalKind::RemoveMember,
            ProposalVariant::MintNft { .. } => ProposalKind::MintNft,
            ProposalVariant::StoreValue { .. } => ProposalKind::StoreValue,
        }
    }
}

/// Variant tag carried by every canonical payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProposalKind {
    SendToken,
    SendEther,
    AddMember,
    RemoveMember,
    MintNft,
    StoreValue,
}

impl ProposalKind {
    pub const ALL: [ProposalKind; 6] = [
        ProposalKind::SendToken,
        ProposalKind::SendEther,
        ProposalKind::AddMember,
        ProposalKind::RemoveMember,
        ProposalKind::MintNft,
        ProposalKind::StoreValue,
    ];

    /// Governor contract entry point for this kind.
    pub fn method(&self) -> &'static str {
        match self {
            ProposalKind::SendToken => "proposeSendToken",
            ProposalKind::SendEther => "proposeSendEther",
            ProposalKind::AddMember => "proposeAddMember",
            ProposalKind::RemoveMember => "proposeRemoveMember",
            ProposalKind::MintNft => "proposeMintNft",
            ProposalKind::StoreValue => "proposeStore",
        }
    }

    pub fn from_method(method: &str) -> Option<ProposalKind> {
        Self::ALL.into_iter().find(|kind| kind.method() == method)
    }
}

impl fmt::Display for ProposalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ProposalKind::SendToken => "send token",
            ProposalKind::SendEther => "send ether",
            ProposalKind::AddMember => "add member",
            ProposalKind::RemoveMember => "remove member",
            ProposalKind::MintNft => "mint NFT",
            ProposalKind::StoreValue => "store value",
        };
        f.write_str(label)
    }
}

/// A filled-in proposal form. Consumed by submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalDraft {
    pub description: String,
    pub variant: ProposalVariant,
}

impl ProposalDraft {
    pub fn new(variant: ProposalVariant, description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            variant,
        }
    }
}

/// Resolved contract call for a proposal. The submitter dispatches it without
/// knowing which variant produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractCall {
    pub method: String,
    pub args: Vec<CallArg>,
    #[serde(with = "crate::chain::types::amount_string")]
    pub value: u128,
}

/// Normalized, variant-agnostic proposal ready for the chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalPayload {
    pub kind: ProposalKind,
    pub description: String,
    pub call: ContractCall,
}

impl CanonicalPayload {
    pub fn to_tx_request(&self, from: Address) -> TxRequest {
        TxRequest {
            from,
            method: self.call.method.clone(),
            args: self.call.args.clone(),
            value: self.call.value,
        }
    }

    /// Address the proposal acts on (recipient or member), if any.
    pub fn target(&self) -> Option<Address> {
        match self.call.args.first() {
            Some(CallArg::Address(addr)) => Some(*addr),
            _ => None,
        }
    }

    /// Amount moved by a transfer proposal.
    pub fn amount(&self) -> Option<u128> {
        match (self.kind, self.call.args.get(1)) {
            (ProposalKind::SendToken | ProposalKind::SendEther, Some(CallArg::Uint(amount))) => {
                Some(*amount)
            }
            _ => None,
        }
    }
}

impl TryFrom<&CanonicalPayload> for ProposalVariant {
    type Error = ProposalError;

    /// Recover the (normalized) variant a payload was built from.
    fn try_from(payload: &CanonicalPayload) -> Result<Self, Self::Error> {
        let mismatch = || ProposalError::UnrecognizedPayload(payload.call.method.clone());

        if ProposalKind::from_method(&payload.call.method) != Some(payload.kind) {
            return Err(mismatch());
        }

        let (last, params) = payload.call.args.split_last().ok_or_else(mismatch)?;
        if *last != CallArg::Text(payload.description.clone()) {
            return Err(mismatch());
        }

        use crate::chain::CallArg::{Address as Addr, Text, Uint};

        let variant = match (payload.kind, params) {
            (ProposalKind::SendToken, [Addr(to), Uint(amount)]) => ProposalVariant::SendToken {
                recipient: to.to_string(),
                amount: *amount,
            },
            (ProposalKind::SendEther, [Addr(to), Uint(amount)]) => ProposalVariant::SendEther {
                recipient: to.to_string(),
                amount: *amount,
            },
            (ProposalKind::AddMember, [Addr(addr), Text(name)]) => ProposalVariant::AddMember {
                address: addr.to_string(),
                name: name.clone(),
            },
            (ProposalKind::RemoveMember, [Addr(addr)]) => ProposalVariant::RemoveMember {
                address: addr.to_string(),
            },
            (ProposalKind::MintNft, [Addr(to), Text(uri)]) => ProposalVariant::MintNft {
                recipient: to.to_string(),
                token_uri: uri.clone(),
            },
            (ProposalKind::StoreValue, [Uint(value)]) => ProposalVariant::StoreValue {
                new_value: *value,
            },
            _ => return Err(mismatch()),
        };

        Ok(variant)
    }
}
