//! Operation registry (decision mapper).
//!
//! Binds each `Operation` to a provider `Capability` plus a declarative
//! field mapping (wire field → capability parameter). The table is built
//! once when the pipeline is constructed and is read-only afterwards.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::providers::{ProviderResult, SportsProvider};
use crate::resilience::RateLimitExceeded;
use crate::types::{Operation, UpstreamResult};

use super::validator::{PayloadSchema, ValidatedPayload};

/// Wire field name → capability parameter name.
pub type FieldMapping = &'static [(&'static str, &'static str)];

/// The decision table every provider is registered with.
pub const DEFAULT_DECISIONS: [(Operation, Capability, FieldMapping); 4] = [
    (Operation::ListLeagues, Capability::ListLeagues, &[]),
    (
        Operation::GetLeagueMatches,
        Capability::LeagueMatches,
        &[("leagueId", "league_id"), ("season", "season")],
    ),
    (Operation::GetTeam, Capability::Team, &[("teamId", "team_id")]),
    (
        Operation::GetMatch,
        Capability::MatchesBetweenTeams,
        &[("teamId1", "team_id1"), ("teamId2", "team_id2")],
    ),
];

// ---------------------------------------------------------------------------
// Capability
// ---------------------------------------------------------------------------

/// One variant per `SportsProvider` method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    ListLeagues,
    LeagueMatches,
    Team,
    MatchesBetweenTeams,
}

impl Capability {
    /// Every parameter the provider method accepts.
    pub fn params(&self) -> &'static [&'static str] {
        match self {
            Capability::ListLeagues => &[],
            Capability::LeagueMatches => &["league_id", "season"],
            Capability::Team => &["team_id"],
            Capability::MatchesBetweenTeams => &["team_id1", "team_id2"],
        }
    }

    /// Parameters with no provider-side default.
    pub fn required_params(&self) -> &'static [&'static str] {
        match self {
            Capability::ListLeagues => &[],
            Capability::LeagueMatches => &["league_id"],
            Capability::Team => &["team_id"],
            Capability::MatchesBetweenTeams => &["team_id1", "team_id2"],
        }
    }

    async fn invoke(
        &self,
        provider: &dyn SportsProvider,
        params: &Params,
    ) -> Result<ProviderResult, RegistryError> {
        let result = match self {
            Capability::ListLeagues => provider.list_leagues().await,
            Capability::LeagueMatches => {
                provider
                    .get_league_matches(params.require("league_id")?, params.get("season"))
                    .await
            }
            Capability::Team => provider.get_team(params.require("team_id")?).await,
            Capability::MatchesBetweenTeams => {
                provider
                    .get_matches_between_teams(params.require("team_id1")?, params.require("team_id2")?)
                    .await
            }
        };
        Ok(result)
    }
}

/// Named arguments collected from a payload.
#[derive(Debug, Default)]
struct Params(BTreeMap<&'static str, u64>);

impl Params {
    fn get(&self, name: &str) -> Option<u64> {
        self.0.get(name).copied()
    }

    fn require(&self, name: &'static str) -> Result<u64, RegistryError> {
        self.get(name).ok_or(RegistryError::MissingArgument(name))
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("no decision registered for operation '{0}'")]
    NotFound(String),

    #[error("operation {0} is already registered")]
    Duplicate(Operation),

    #[error("mapping for {operation} uses field '{field}' which is not in its payload schema")]
    UnknownField { operation: Operation, field: &'static str },

    #[error("capability {capability:?} does not accept parameter '{param}'")]
    UnknownParam { capability: Capability, param: &'static str },

    #[error("capability {capability:?} requires parameter '{param}' but no field maps to it")]
    UnmappedParam { capability: Capability, param: &'static str },

    #[error("payload for {payload} passed to decision for {decision}")]
    OperationMismatch { decision: Operation, payload: Operation },

    #[error("required parameter '{0}' missing at dispatch")]
    MissingArgument(&'static str),
}

/// Why `execute` did not produce an `UpstreamResult`.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DispatchError {
    #[error(transparent)]
    RateLimited(#[from] RateLimitExceeded),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Registered binding of an operation to its capability and mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub operation: Operation,
    pub capability: Capability,
    pub mapping: FieldMapping,
}

pub struct OperationRegistry {
    provider: Arc<dyn SportsProvider>,
    decisions: BTreeMap<Operation, Decision>,
}

impl OperationRegistry {
    /// An empty registry. Most callers want `with_default_decisions`.
    pub fn new(provider: Arc<dyn SportsProvider>) -> Self {
        Self { provider, decisions: BTreeMap::new() }
    }

    /// Registry with all four operations bound per `DEFAULT_DECISIONS`.
    pub fn with_default_decisions(provider: Arc<dyn SportsProvider>) -> Result<Self, RegistryError> {
        let mut registry = Self::new(provider);
        for (operation, capability, mapping) in DEFAULT_DECISIONS {
            registry.register(operation, capability, mapping)?;
        }
        Ok(registry)
    }

    /// Add a decision after checking the mapping against both the payload
    /// schema and the capability's parameter list.
    pub fn register(
        &mut self,
        operation: Operation,
        capability: Capability,
        mapping: FieldMapping,
    ) -> Result<(), RegistryError> {
        if self.decisions.contains_key(&operation) {
            return Err(RegistryError::Duplicate(operation));
        }

        let schema = PayloadSchema::for_operation(operation);
        for &(field, param) in mapping {
            if !schema.contains(field) {
                return Err(RegistryError::UnknownField { operation, field });
            }
            if !capability.params().contains(&param) {
                return Err(RegistryError::UnknownParam { capability, param });
            }
        }
        for &param in capability.required_params() {
            if !mapping.iter().any(|&(_, p)| p == param) {
                return Err(RegistryError::UnmappedParam { capability, param });
            }
        }

        self.decisions.insert(operation, Decision { operation, capability, mapping });
        Ok(())
    }

    pub fn lookup(&self, operation_name: &str) -> Result<&Decision, RegistryError> {
        self.decisions
            .values()
            .find(|d| d.operation.as_str() == operation_name)
            .ok_or_else(|| RegistryError::NotFound(operation_name.to_string()))
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    pub fn provider(&self) -> &Arc<dyn SportsProvider> {
        &self.provider
    }

    pub fn len(&self) -> usize {
        self.decisions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decisions.is_empty()
    }

    /// Forward mapped payload fields to the bound capability.
    ///
    /// Fields absent from the payload are omitted; the provider applies
    /// its own default. The provider's result is returned unchanged.
    pub async fn execute(
        &self,
        decision: &Decision,
        payload: &ValidatedPayload,
    ) -> Result<UpstreamResult, DispatchError> {
        if payload.operation() != decision.operation {
            return Err(RegistryError::OperationMismatch {
                decision: decision.operation,
                payload: payload.operation(),
            }
            .into());
        }

        let mut params = Params::default();
        for &(field, param) in decision.mapping {
            if let Some(value) = payload.get(field) {
                params.0.insert(param, value);
            }
        }

        let result = decision.capability.invoke(self.provider.as_ref(), &params).await??;
        Ok(result)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
