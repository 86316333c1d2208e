//! Capabilities Facade (§4.14): a single aggregator handing the orchestrator
//! and sub-graphs one handle per capability port, constructed once at
//! startup from configuration.

use crate::ports::{
    KnowledgePort, MultimodalPort, PlatformRulesPort, PredictionPort, SampleLibraryPort, SearchPort,
    VideoDecompositionPort,
};
use crate::ports::{CaseTemplateService, DataLoopService, MethodologyService};
use std::sync::Arc;

/// Composite accessor for every capability port. Each field is a trait
/// object so the concrete adapter (mock or real) is selected purely by
/// configuration at construction time; nothing downstream of this struct
/// is aware of which adapter is in use.
#[derive(Clone)]
pub struct Capabilities {
    pub search: Arc<dyn SearchPort>,
    pub knowledge: Arc<dyn KnowledgePort>,
    pub multimodal: Arc<dyn MultimodalPort>,
    pub prediction: Arc<dyn PredictionPort>,
    pub video_decomposition: Arc<dyn VideoDecompositionPort>,
    pub sample_library: Arc<dyn SampleLibraryPort>,
    pub platform_rules: Arc<dyn PlatformRulesPort>,
    pub methodology: Option<Arc<dyn MethodologyService>>,
    pub case_template: Option<Arc<dyn CaseTemplateService>>,
    pub data_loop: Option<Arc<dyn DataLoopService>>,
}

impl std::fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Capabilities")
            .field("methodology_enabled", &self.methodology.is_some())
            .field("case_template_enabled", &self.case_template.is_some())
            .field("data_loop_enabled", &self.data_loop.is_some())
            .finish()
    }
}
