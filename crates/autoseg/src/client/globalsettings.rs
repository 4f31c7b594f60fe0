use crate::client::output::outputs::Output;
use crate::workflow::session::WorkspaceOverrides;

/// Where and how the control plane is reached.
pub struct PlatformSettings {
    pub endpoint: String,
    pub api_version: String,
    pub workspace: WorkspaceOverrides,
}

pub struct GlobalSettings {
    platform: PlatformSettings,
    printer: Box<dyn Output>,
}

impl GlobalSettings {
    pub fn new(platform: PlatformSettings, printer: Box<dyn Output>) -> Self {
        GlobalSettings { platform, printer }
    }

    pub fn platform(&self) -> &PlatformSettings {
        &self.platform
    }

    pub fn printer(&self) -> &dyn Output {
        self.printer.as_ref()
    }
}
