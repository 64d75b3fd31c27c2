pub mod build;
pub mod invalidation;
pub mod lock;
pub mod mutation;

use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::clients::{
    AnalysisService, ChannelNotificationBus, HttpAnalysisService, HttpModificationService,
    HttpReportService, LocalAnalysisService, LocalModificationService, LocalReportService,
    ModificationService, NotificationBus, ReportService, StudyEvent,
};
use crate::config::Config;
use crate::domain::{RootNetwork, Study, StudyError};
use crate::store::{MatrixStore, StudyStore, TreeStore};

pub use build::CompletionEvent;
pub use lock::{LockCoordinator, SubtreeLockGuard};

/// Everything the study orchestration needs: the stores, the lock
/// coordinator and the external collaborators.
pub struct StudyOrchestrator {
    pub studies: StudyStore,
    pub tree: TreeStore,
    pub matrix: MatrixStore,
    pub locks: Arc<LockCoordinator>,
    pub modifications: Arc<dyn ModificationService>,
    pub analysis: Arc<dyn AnalysisService>,
    pub reports: Arc<dyn ReportService>,
    pub notifications: Arc<dyn NotificationBus>,
}

impl StudyOrchestrator {
    pub fn new(
        modifications: Arc<dyn ModificationService>,
        analysis: Arc<dyn AnalysisService>,
        reports: Arc<dyn ReportService>,
        notifications: Arc<dyn NotificationBus>,
    ) -> Self {
        Self {
            studies: StudyStore::new(),
            tree: TreeStore::new(),
            matrix: MatrixStore::new(),
            locks: Arc::new(LockCoordinator::new()),
            modifications,
            analysis,
            reports,
            notifications,
        }
    }

    /// Create a study with its root node and first root network.
    pub async fn create_study(
        &self,
        name: String,
        root_network_name: String,
        root_network_tag: String,
        network_id: Uuid,
    ) -> Result<Study, StudyError> {
        let study_id = Uuid::new_v4();
        let root = self.tree.create_tree(study_id).await;
        let study = Study {
            id: study_id,
            name,
            root_node_id: root.id,
            created_at: Utc::now(),
        };
        let root_network = RootNetwork::new(
            study_id,
            root_network_name,
            root_network_tag,
            network_id,
        );
        self.matrix.add_node(root.id, &[root_network.id]).await;
        self.studies.insert(study.clone(), root_network).await;
        if let Err(error) = self.reports.create_report(root.report_id).await {
            warn!(%error, "root node report creation failed");
        }
        self.notifications
            .publish(StudyEvent::TreeChanged { study_id });
        Ok(study)
    }

    /// Delete a study with its tree, matrix cells and remote artifacts.
    pub async fn delete_study(&self, study_id: Uuid) -> Result<(), StudyError> {
        let (study, _root_networks) = self.studies.remove(study_id).await?;
        let nodes = self.tree.drop_tree(study_id).await?;
        let node_ids: Vec<Uuid> = nodes.iter().map(|n| n.id).collect();
        let cells = self.matrix.remove_nodes(&node_ids).await;
        self.discard_cells(cells).await;
        for node in &nodes {
            if let Err(error) = self.modifications.delete_group(node.modification_group_id).await {
                warn!(%error, node = %node.id, "modification group deletion failed");
            }
            if let Err(error) = self.reports.delete_report(node.report_id).await {
                warn!(%error, node = %node.id, "report deletion failed");
            }
        }
        info!(study = %study.id, nodes = nodes.len(), "study deleted");
        self.notifications
            .publish(StudyEvent::StudyDeleted { study_id });
        Ok(())
    }

    /// Attach a root network: every existing node gains a NOT_BUILT cell.
    pub async fn add_root_network(
        &self,
        study_id: Uuid,
        name: String,
        tag: String,
        network_id: Uuid,
    ) -> Result<RootNetwork, StudyError> {
        self.studies.study(study_id).await?;
        let root_network = RootNetwork::new(study_id, name, tag, network_id);
        let node_ids = self.tree.all_node_ids(study_id).await?;
        self.matrix.add_root_network(root_network.id, &node_ids).await;
        self.studies
            .add_root_network(study_id, root_network.clone())
            .await?;
        self.notifications
            .publish(StudyEvent::TreeChanged { study_id });
        Ok(root_network)
    }

    /// Detach a root network; its column of matrix cells goes with it.
    pub async fn remove_root_network(
        &self,
        study_id: Uuid,
        root_network_id: Uuid,
    ) -> Result<(), StudyError> {
        self.studies
            .remove_root_network(study_id, root_network_id)
            .await?;
        let cells = self.matrix.remove_root_network(root_network_id).await;
        self.discard_cells(cells).await;
        self.notifications
            .publish(StudyEvent::TreeChanged { study_id });
        Ok(())
    }
}

/// Shared application state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub cfg: Config,
    pub orchestrator: Arc<StudyOrchestrator>,
    pub completions: mpsc::Sender<CompletionEvent>,
    pub bus: Arc<ChannelNotificationBus>,
}

impl AppState {
    pub async fn new(cfg: Config) -> Result<(Self, mpsc::Receiver<CompletionEvent>)> {
        let bus = Arc::new(ChannelNotificationBus::default());
        let timeout = Duration::from_secs(cfg.remotes.http_timeout_seconds);

        let (modifications, analysis, reports): (
            Arc<dyn ModificationService>,
            Arc<dyn AnalysisService>,
            Arc<dyn ReportService>,
        ) = if cfg.remotes.provider == "local" {
            (
                Arc::new(LocalModificationService::default()),
                Arc::new(LocalAnalysisService::default()),
                Arc::new(LocalReportService::default()),
            )
        } else {
            (
                Arc::new(HttpModificationService::new(
                    cfg.remotes.modification_url.clone(),
                    timeout,
                )?),
                Arc::new(HttpAnalysisService::new(
                    cfg.remotes.analysis_url.clone(),
                    timeout,
                )?),
                Arc::new(HttpReportService::new(
                    cfg.remotes.report_url.clone(),
                    timeout,
                )?),
            )
        };

        let orchestrator = Arc::new(StudyOrchestrator::new(
            modifications,
            analysis,
            reports,
            bus.clone(),
        ));
        Ok(Self::with_orchestrator(cfg, orchestrator, bus))
    }

    pub fn with_orchestrator(
        cfg: Config,
        orchestrator: Arc<StudyOrchestrator>,
        bus: Arc<ChannelNotificationBus>,
    ) -> (Self, mpsc::Receiver<CompletionEvent>) {
        let (tx, rx) = mpsc::channel(256);
        (
            Self {
                cfg,
                orchestrator,
                completions: tx,
                bus,
            },
            rx,
        )
    }
}

/// Consume asynchronous computation-completion events. One consumer task for
/// the whole server; matrix updates happen here, not on request tasks.
pub fn spawn_completion_consumer(state: AppState, mut rx: mpsc::Receiver<CompletionEvent>) {
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            if let Err(error) = state.orchestrator.apply_completion(&event).await {
                warn!(%error, result = %event.result_id, "completion event dropped");
            }
        }
        info!("completion consumer stopped");
    });
}
