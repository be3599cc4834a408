//! Service graph wiring from [`Settings`].

use std::sync::Arc;

use tracing::info;

use caseflow_ai::{InferenceError, InferenceGateway};

use crate::admission::WorkflowAdmission;
use crate::blob::{BlobStore, InMemoryBlobStore, LocalBlobStore};
use crate::cases::{
    ArtifactStore, CaseService, CaseStore, InMemoryArtifactStore, InMemoryCaseStore,
    PostgresArtifactStore, PostgresCaseStore,
};
use crate::config::Settings;
use crate::db;
use crate::error::StoreError;
use crate::jobs::{InMemoryJobStore, JobStateMachine, JobStore, PostgresJobStore, QueueClaimer};
use crate::knowledge::{InMemoryKnowledgeStore, KnowledgeIndex, KnowledgeStore, PostgresKnowledgeStore};
use crate::pipeline::{OutputResolver, PipelineDeps, PipelineSettings, WorkerPipeline};

#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Inference(#[from] InferenceError),
}

/// Every store the services run on.
#[derive(Clone)]
pub struct Backends {
    pub jobs: Arc<dyn JobStore>,
    pub cases: Arc<dyn CaseStore>,
    pub artifacts: Arc<dyn ArtifactStore>,
    pub knowledge: Arc<dyn KnowledgeStore>,
    pub blobs: Arc<dyn BlobStore>,
}

impl Backends {
    /// Stores and blobs all in memory.
    pub fn in_memory() -> Self {
        Self {
            jobs: InMemoryJobStore::arc(),
            cases: InMemoryCaseStore::arc(),
            artifacts: InMemoryArtifactStore::arc(),
            knowledge: InMemoryKnowledgeStore::arc(),
            blobs: InMemoryBlobStore::arc(),
        }
    }
}

/// The application services shared by the API and the worker.
#[derive(Clone)]
pub struct Services {
    pub cases: CaseService,
    pub machine: JobStateMachine,
    pub claimer: QueueClaimer,
    pub admission: WorkflowAdmission,
    pub knowledge: KnowledgeIndex,
    pub gateway: InferenceGateway,
    pub pipeline: WorkerPipeline,
    pub resolver: OutputResolver,
    /// `true` when stores live in process memory (no database configured).
    pub in_memory: bool,
}

impl Services {
    pub fn new(
        backends: Backends,
        gateway: InferenceGateway,
        settings: PipelineSettings,
        in_memory: bool,
    ) -> Self {
        let machine = JobStateMachine::new(backends.jobs.clone());
        let claimer = QueueClaimer::new(backends.jobs.clone());
        let knowledge = KnowledgeIndex::new(backends.knowledge.clone());

        let pipeline = WorkerPipeline::new(
            PipelineDeps {
                claimer: claimer.clone(),
                machine: machine.clone(),
                artifacts: backends.artifacts.clone(),
                blobs: backends.blobs.clone(),
                knowledge: knowledge.clone(),
                gateway: gateway.clone(),
            },
            settings,
        );

        Self {
            cases: CaseService::new(backends.cases.clone()),
            admission: WorkflowAdmission::new(
                backends.cases.clone(),
                backends.artifacts.clone(),
                backends.blobs.clone(),
                machine.clone(),
            ),
            resolver: OutputResolver::new(backends.jobs, backends.artifacts, backends.blobs),
            machine,
            claimer,
            knowledge,
            gateway,
            pipeline,
            in_memory,
        }
    }

    /// In-memory services on the mock provider, for tests and local runs.
    pub fn in_memory(settings: PipelineSettings) -> Self {
        Self::new(Backends::in_memory(), InferenceGateway::mock(), settings, true)
    }

    /// Build from settings: Postgres when `DATABASE_URL` is set, memory otherwise.
    pub async fn from_settings(settings: &Settings) -> Result<Self, BootstrapError> {
        let gateway = InferenceGateway::from_settings(&settings.inference)?;

        let (backends, in_memory) = match &settings.database_url {
            Some(url) => {
                let pool = db::connect(url).await?;
                db::ensure_schema(&pool).await?;
                let backends = Backends {
                    jobs: Arc::new(PostgresJobStore::new(pool.clone())),
                    cases: Arc::new(PostgresCaseStore::new(pool.clone())),
                    artifacts: Arc::new(PostgresArtifactStore::new(pool.clone())),
                    knowledge: Arc::new(PostgresKnowledgeStore::new(pool)),
                    blobs: Arc::new(LocalBlobStore::new(settings.artifact_dir.clone())),
                };
                (backends, false)
            }
            None => {
                let backends = Backends {
                    blobs: Arc::new(LocalBlobStore::new(settings.artifact_dir.clone())),
                    ..Backends::in_memory()
                };
                (backends, true)
            }
        };

        info!(
            in_memory,
            provider = gateway.kind().as_str(),
            top_k = settings.pipeline.retrieval_top_k,
            downgrade_blocked = settings.pipeline.downgrade_blocked,
            "services ready"
        );

        Ok(Self::new(backends, gateway, settings.pipeline, in_memory))
    }
}
