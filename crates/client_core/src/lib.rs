use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    sync::Arc,
    time::Duration,
};

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use shared::{
    amount::parse_display_amount,
    domain::{next_status, Action, Address, Agreement, AgreementId, AgreementStatus, NewAgreementDraft},
    error::{RepositoryError, SubmitOutcome},
    protocol::{AgreementRecord, CallOutcome, ContractCall, Network},
};
use tokio::sync::{broadcast, Mutex};
use tracing::{error, info, warn};

pub mod authorizer;
pub mod config;
pub mod gateway;
pub mod listing;
pub mod session;

pub use gateway::HttpContractReader;

use config::Settings;
use listing::{ListQuery, PageSlice};
use session::Session;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletIdentity {
    pub address: Address,
}

/// Wallet/session boundary: sign-in state, identity, and transaction
/// signing plus broadcast. Signing is interactive and may hang on user
/// input; the submitter wraps it in a bounded timeout.
#[async_trait]
pub trait WalletProvider: Send + Sync {
    async fn is_signed_in(&self) -> bool;
    async fn load_identity(&self) -> Result<WalletIdentity>;
    async fn sign_and_broadcast(&self, call: ContractCall, network: Network)
        -> Result<CallOutcome>;
}

pub struct MissingWalletProvider;

#[async_trait]
impl WalletProvider for MissingWalletProvider {
    async fn is_signed_in(&self) -> bool {
        false
    }

    async fn load_identity(&self) -> Result<WalletIdentity> {
        Err(anyhow!("wallet provider is unavailable"))
    }

    async fn sign_and_broadcast(
        &self,
        call: ContractCall,
        _network: Network,
    ) -> Result<CallOutcome> {
        Err(anyhow!(
            "wallet provider is unavailable; cannot sign {}",
            call.function
        ))
    }
}

/// Read-only contract boundary used by the repository.
#[async_trait]
pub trait ContractReader: Send + Sync {
    async fn read_only(&self, call: ContractCall) -> Result<serde_json::Value>;
}

pub struct MissingContractReader;

#[async_trait]
impl ContractReader for MissingContractReader {
    async fn read_only(&self, call: ContractCall) -> Result<serde_json::Value> {
        Err(anyhow!(
            "contract reader is unavailable; cannot read {}",
            call.function
        ))
    }
}

/// Per-agreement submission lifecycle. `Reconciling` covers the window
/// between an optimistic cache update and the refresh that confirms or
/// corrects it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubmissionPhase {
    #[default]
    Idle,
    InFlight(Action),
    Reconciling,
}

#[derive(Debug, Clone)]
pub enum ClientEvent {
    SessionChanged(Option<Address>),
    AgreementsRefreshed {
        count: usize,
    },
    SubmissionResolved {
        id: AgreementId,
        action: Action,
        outcome: SubmitOutcome,
    },
    AgreementCreated {
        outcome: SubmitOutcome,
    },
    /// An optimistic status diverged from refreshed ground truth; the
    /// refreshed value won.
    StaleReadResolved {
        id: AgreementId,
        expected: AgreementStatus,
        actual: AgreementStatus,
    },
    Error(String),
}

struct ClientState {
    session: Session,
    agreements: BTreeMap<AgreementId, Agreement>,
    phases: HashMap<AgreementId, SubmissionPhase>,
}

/// The agreement lifecycle client: session state, a read-through cache of
/// contract-projected agreements, the action authorizer gate, and the
/// transaction submitter with optimistic updates and reconciliation.
pub struct EscrowClient {
    wallet: Arc<dyn WalletProvider>,
    reader: Arc<dyn ContractReader>,
    settings: Settings,
    inner: Mutex<ClientState>,
    // Serializes refreshes so concurrent reconciliations never interleave.
    refresh_lock: Mutex<()>,
    events: broadcast::Sender<ClientEvent>,
}

impl EscrowClient {
    pub fn new(settings: Settings) -> Arc<Self> {
        Self::new_with_dependencies(
            settings,
            Arc::new(MissingWalletProvider),
            Arc::new(MissingContractReader),
        )
    }

    pub fn new_with_dependencies(
        settings: Settings,
        wallet: Arc<dyn WalletProvider>,
        reader: Arc<dyn ContractReader>,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(256);
        Arc::new(Self {
            wallet,
            reader,
            settings,
            inner: Mutex::new(ClientState {
                session: Session::new(),
                agreements: BTreeMap::new(),
                phases: HashMap::new(),
            }),
            refresh_lock: Mutex::new(()),
            events,
        })
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Seeds the session from the wallet boundary at startup. Returns the
    /// restored address, or `None` when no wallet session exists.
    pub async fn restore_session(&self) -> Result<Option<Address>> {
        if !self.wallet.is_signed_in().await {
            return Ok(None);
        }
        let identity = self
            .wallet
            .load_identity()
            .await
            .context("failed to load wallet identity")?;
        self.connect(identity.address.clone()).await;
        Ok(Some(identity.address))
    }

    /// Connecting the already-active address is a no-op; switching addresses
    /// drops the cached collection so views re-derive from the new scope.
    pub async fn connect(&self, address: Address) {
        let changed = {
            let mut guard = self.inner.lock().await;
            let changed = guard.session.connect(address.clone());
            if changed {
                guard.agreements.clear();
                guard.phases.clear();
            }
            changed
        };
        if changed {
            info!(%address, "wallet session connected");
            let _ = self.events.send(ClientEvent::SessionChanged(Some(address)));
        }
    }

    pub async fn disconnect(&self) {
        let changed = {
            let mut guard = self.inner.lock().await;
            let changed = guard.session.disconnect();
            if changed {
                guard.agreements.clear();
                guard.phases.clear();
            }
            changed
        };
        if changed {
            info!("wallet session disconnected");
            let _ = self.events.send(ClientEvent::SessionChanged(None));
        }
    }

    pub async fn current_address(&self) -> Option<Address> {
        self.inner.lock().await.session.current().cloned()
    }

    /// Re-derives the full collection from the contract boundary:
    /// `get-agreement-nonce`, then `get-agreement(1..=count)`. Records that
    /// fail to decode are skipped; a gateway failure leaves the previous
    /// cache intact. Optimistic statuses that diverge from refreshed ground
    /// truth are overwritten, with a `StaleReadResolved` event per record.
    pub async fn refresh(&self) -> Result<(), RepositoryError> {
        let _serialized = self.refresh_lock.lock().await;

        let nonce = self
            .reader
            .read_only(ContractCall::get_agreement_nonce())
            .await
            .map_err(|e| RepositoryError::Gateway(format!("{e:#}")))?;
        let count = nonce
            .as_u64()
            .ok_or_else(|| RepositoryError::Gateway(format!("unexpected agreement nonce: {nonce}")))?;

        let mut fetched = BTreeMap::new();
        for raw_id in 1..=count {
            let id = AgreementId(raw_id);
            let value = self
                .reader
                .read_only(ContractCall::get_agreement(id))
                .await
                .map_err(|e| RepositoryError::Gateway(format!("{e:#}")))?;
            if value.is_null() {
                continue;
            }
            let record: AgreementRecord = match serde_json::from_value(value) {
                Ok(record) => record,
                Err(err) => {
                    warn!(agreement_id = raw_id, "skipping undecodable agreement record: {err}");
                    continue;
                }
            };
            match Agreement::try_from(record) {
                Ok(agreement) => {
                    fetched.insert(id, agreement);
                }
                Err(err) => {
                    warn!(agreement_id = raw_id, "skipping invalid agreement record: {err}");
                }
            }
        }

        let count = fetched.len();
        {
            let mut guard = self.inner.lock().await;
            let state = &mut *guard;
            for (id, phase) in state.phases.iter_mut() {
                if *phase != SubmissionPhase::Reconciling {
                    continue;
                }
                if let (Some(cached), Some(refreshed)) =
                    (state.agreements.get(id), fetched.get(id))
                {
                    if cached.status != refreshed.status {
                        warn!(
                            agreement_id = id.0,
                            expected = %cached.status,
                            actual = %refreshed.status,
                            "optimistic status diverged from ledger; overwriting with ground truth"
                        );
                        let _ = self.events.send(ClientEvent::StaleReadResolved {
                            id: *id,
                            expected: cached.status,
                            actual: refreshed.status,
                        });
                    }
                }
                *phase = SubmissionPhase::Idle;
            }
            state.agreements = fetched;
        }

        let _ = self.events.send(ClientEvent::AgreementsRefreshed { count });
        Ok(())
    }

    /// Agreements where `address` is buyer or vendor, ordered by id.
    pub async fn list(&self, address: &Address) -> Vec<Agreement> {
        let guard = self.inner.lock().await;
        guard
            .agreements
            .values()
            .filter(|a| a.is_party(address))
            .cloned()
            .collect()
    }

    pub async fn get(&self, id: AgreementId) -> Result<Agreement, RepositoryError> {
        self.inner
            .lock()
            .await
            .agreements
            .get(&id)
            .cloned()
            .ok_or(RepositoryError::NotFound(id))
    }

    /// Filter/sort/paginate over the session-scoped collection. `None` when
    /// no wallet session is active.
    pub async fn list_page(&self, query: &ListQuery) -> Option<PageSlice> {
        let guard = self.inner.lock().await;
        let viewer = guard.session.current()?.clone();
        let scoped: Vec<Agreement> = guard
            .agreements
            .values()
            .filter(|a| a.is_party(&viewer))
            .cloned()
            .collect();
        Some(listing::page(&scoped, &viewer, query, self.settings.page_size))
    }

    /// Actions the active session may currently request for `id`. Empty when
    /// disconnected.
    pub async fn available_actions(
        &self,
        id: AgreementId,
    ) -> Result<BTreeSet<Action>, RepositoryError> {
        let guard = self.inner.lock().await;
        let Some(address) = guard.session.current() else {
            return Ok(BTreeSet::new());
        };
        let agreement = guard
            .agreements
            .get(&id)
            .ok_or(RepositoryError::NotFound(id))?;
        Ok(authorizer::legal_actions(agreement, address))
    }

    pub async fn submission_phase(&self, id: AgreementId) -> SubmissionPhase {
        self.inner
            .lock()
            .await
            .phases
            .get(&id)
            .copied()
            .unwrap_or_default()
    }

    /// Submits a lifecycle transition for `id`. Terminates in exactly one of
    /// the five `SubmitOutcome`s; an `Err` is reserved for infrastructure
    /// misuse (no session, unknown agreement) where no submission was
    /// attempted at all.
    pub async fn submit(&self, action: Action, id: AgreementId) -> Result<SubmitOutcome> {
        let status = {
            let mut guard = self.inner.lock().await;
            let address = guard
                .session
                .current()
                .cloned()
                .ok_or_else(|| anyhow!("no active wallet session"))?;
            let agreement = guard
                .agreements
                .get(&id)
                .cloned()
                .ok_or(RepositoryError::NotFound(id))?;

            if !authorizer::legal_actions(&agreement, &address).contains(&action) {
                drop(guard);
                info!(agreement_id = id.0, %action, "submission vetoed by authorizer");
                return Ok(self.resolve(id, action, SubmitOutcome::IllegalAction, false).await);
            }

            let phase = guard.phases.get(&id).copied().unwrap_or_default();
            if phase != SubmissionPhase::Idle {
                drop(guard);
                warn!(agreement_id = id.0, %action, ?phase, "submission already in flight");
                return Ok(self.resolve(id, action, SubmitOutcome::AlreadyPending, false).await);
            }

            guard.phases.insert(id, SubmissionPhase::InFlight(action));
            agreement.status
        };

        let broadcast = tokio::time::timeout(
            Duration::from_secs(self.settings.submission_timeout_secs),
            self.wallet
                .sign_and_broadcast(ContractCall::lifecycle(action, id), self.settings.network),
        )
        .await;

        let outcome = match broadcast {
            Err(_) => {
                self.clear_phase(id).await;
                warn!(agreement_id = id.0, %action, "wallet signing timed out");
                SubmitOutcome::SubmissionFailed {
                    error: format!(
                        "wallet signing timed out after {}s",
                        self.settings.submission_timeout_secs
                    ),
                }
            }
            Ok(Err(err)) => {
                self.clear_phase(id).await;
                error!(agreement_id = id.0, %action, "broadcast failed: {err:#}");
                SubmitOutcome::SubmissionFailed {
                    error: err.to_string(),
                }
            }
            Ok(Ok(CallOutcome::Cancelled)) => {
                self.clear_phase(id).await;
                info!(agreement_id = id.0, %action, "user cancelled wallet signing");
                SubmitOutcome::Cancelled
            }
            Ok(Ok(CallOutcome::Failed { error })) => {
                self.clear_phase(id).await;
                error!(agreement_id = id.0, %action, "broadcast rejected: {error}");
                SubmitOutcome::SubmissionFailed { error }
            }
            Ok(Ok(CallOutcome::Finished { txid })) => {
                let optimistic = {
                    let mut guard = self.inner.lock().await;
                    guard.phases.insert(id, SubmissionPhase::Reconciling);
                    let next = next_status(status, action);
                    if let (Some(agreement), Some(next)) = (guard.agreements.get_mut(&id), next)
                    {
                        agreement.status = next;
                    }
                    next.unwrap_or(status)
                };
                info!(
                    agreement_id = id.0,
                    %action,
                    txid = %txid,
                    optimistic_status = %optimistic,
                    "broadcast accepted; cache advanced optimistically"
                );
                SubmitOutcome::Accepted {
                    optimistic_status: optimistic,
                }
            }
        };

        Ok(self.resolve(id, action, outcome, true).await)
    }

    /// Validates and submits a `create-agreement` call. The new record's id
    /// is contract-assigned, so there is no optimistic insert; the
    /// post-broadcast refresh picks it up.
    pub async fn create_agreement(&self, draft: &NewAgreementDraft) -> Result<SubmitOutcome> {
        let address = self
            .current_address()
            .await
            .ok_or_else(|| anyhow!("no active wallet session"))?;
        let amount = parse_display_amount(&draft.amount)?;
        let buyer = draft.buyer.trim();
        if buyer.is_empty() {
            bail!("buyer principal is required");
        }
        let buyer = Address::new(buyer);
        if buyer == address {
            bail!("buyer and vendor must be different principals");
        }
        let description = draft.description.trim();
        if description.is_empty() {
            bail!("description is required");
        }

        let broadcast = tokio::time::timeout(
            Duration::from_secs(self.settings.submission_timeout_secs),
            self.wallet.sign_and_broadcast(
                ContractCall::create_agreement(&buyer, amount, description),
                self.settings.network,
            ),
        )
        .await;

        let outcome = match broadcast {
            Err(_) => {
                warn!("wallet signing timed out for create-agreement");
                SubmitOutcome::SubmissionFailed {
                    error: format!(
                        "wallet signing timed out after {}s",
                        self.settings.submission_timeout_secs
                    ),
                }
            }
            Ok(Err(err)) => {
                error!("create-agreement broadcast failed: {err:#}");
                SubmitOutcome::SubmissionFailed {
                    error: err.to_string(),
                }
            }
            Ok(Ok(CallOutcome::Cancelled)) => {
                info!("user cancelled create-agreement signing");
                SubmitOutcome::Cancelled
            }
            Ok(Ok(CallOutcome::Failed { error })) => {
                error!("create-agreement broadcast rejected: {error}");
                SubmitOutcome::SubmissionFailed { error }
            }
            Ok(Ok(CallOutcome::Finished { txid })) => {
                info!(txid = %txid, %buyer, %amount, "create-agreement broadcast accepted");
                SubmitOutcome::Accepted {
                    optimistic_status: AgreementStatus::Pending,
                }
            }
        };

        let _ = self.events.send(ClientEvent::AgreementCreated {
            outcome: outcome.clone(),
        });
        if let Err(err) = self.refresh().await {
            warn!("post-creation refresh failed: {err}");
        }
        Ok(outcome)
    }

    async fn clear_phase(&self, id: AgreementId) {
        self.inner.lock().await.phases.remove(&id);
    }

    async fn resolve(
        &self,
        id: AgreementId,
        action: Action,
        outcome: SubmitOutcome,
        reconcile: bool,
    ) -> SubmitOutcome {
        let _ = self.events.send(ClientEvent::SubmissionResolved {
            id,
            action,
            outcome: outcome.clone(),
        });

        if reconcile {
            if let Err(err) = self.refresh().await {
                warn!(agreement_id = id.0, "post-submission refresh failed: {err}");
                let _ = self.events.send(ClientEvent::Error(err.to_string()));
                // The reconciling marker must not outlive a failed refresh,
                // or the agreement stays locked out.
                let mut guard = self.inner.lock().await;
                if let Some(phase) = guard.phases.get_mut(&id) {
                    if *phase == SubmissionPhase::Reconciling {
                        *phase = SubmissionPhase::Idle;
                    }
                }
            }
        }

        outcome
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
