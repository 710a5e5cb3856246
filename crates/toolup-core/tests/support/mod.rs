#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use toolup_backend::{
    ActiveToolchain, BackendCapabilities, BackendError, InstallHandle, InstallOutcome,
    InstallPath, InstalledVersion, PackageManager, PackageOutcome, PackageRequirement,
    ToolBinary, ToolchainBackend, ToolchainVersion,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Detect,
    ListInstalled,
    ResolveLatest,
    InstalledPackages,
    Install(String),
    Activate(String),
    Uninstall(String),
    ListTools,
    ReinstallTool(String),
}

impl Call {
    pub fn is_mutating(&self) -> bool {
        matches!(
            self,
            Self::Install(_) | Self::Activate(_) | Self::Uninstall(_) | Self::ReinstallTool(_)
        )
    }
}

#[derive(Debug)]
pub struct MockState {
    pub root: PathBuf,
    pub active: Option<String>,
    pub installed: Vec<String>,
    pub latest: Result<String, BackendError>,
    pub packages: Vec<PackageRequirement>,
    pub tools: Vec<(String, Option<String>)>,
    pub variants: Vec<String>,
    pub unavailable: bool,
    pub fail_install: bool,
    pub ignore_activate: bool,
    pub fail_uninstall: Vec<String>,
    pub calls: Vec<Call>,
}

/// Scriptable in-memory backend that records every call it receives.
#[derive(Clone)]
pub struct MockBackend {
    name: &'static str,
    capabilities: BackendCapabilities,
    implicit: &'static [&'static str],
    state: Arc<Mutex<MockState>>,
}

impl MockBackend {
    pub fn new(name: &'static str, active: &str, installed: &[&str], latest: &str) -> Self {
        Self {
            name,
            capabilities: BackendCapabilities::default(),
            implicit: &[],
            state: Arc::new(Mutex::new(MockState {
                root: PathBuf::from("/home/dev/.toolchains").join(name),
                active: Some(active.to_string()),
                installed: installed.iter().map(ToString::to_string).collect(),
                latest: Ok(latest.to_string()),
                packages: Vec::new(),
                tools: Vec::new(),
                variants: Vec::new(),
                unavailable: false,
                fail_install: false,
                ignore_activate: false,
                fail_uninstall: Vec::new(),
                calls: Vec::new(),
            })),
        }
    }

    pub fn gated(mut self) -> Self {
        self.capabilities.gated = true;
        self
    }

    pub fn with_tool_inventory(mut self) -> Self {
        self.capabilities.tool_inventory = true;
        self
    }

    pub fn with_implicit(mut self, implicit: &'static [&'static str]) -> Self {
        self.implicit = implicit;
        self
    }

    pub fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().expect("mock state lock")
    }

    pub fn boxed(&self) -> Box<dyn ToolchainBackend> {
        Box::new(self.clone())
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    pub fn mutating_calls(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_mutating).collect()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    pub fn installed(&self) -> Vec<String> {
        self.state().installed.clone()
    }

    pub fn active(&self) -> Option<String> {
        self.state().active.clone()
    }

    fn record(&self, call: Call) -> MutexGuard<'_, MockState> {
        let mut state = self.state();
        state.calls.push(call);
        state
    }
}

fn parse(text: &str) -> Result<ToolchainVersion, BackendError> {
    Ok(text.parse()?)
}

#[async_trait]
impl ToolchainBackend for MockBackend {
    fn name(&self) -> &'static str {
        self.name
    }

    fn capabilities(&self) -> BackendCapabilities {
        self.capabilities
    }

    fn implicit_defaults(&self) -> &'static [&'static str] {
        self.implicit
    }

    async fn detect(&self) -> Result<Option<ActiveToolchain>, BackendError> {
        let state = self.record(Call::Detect);
        if state.unavailable {
            return Err(BackendError::Unavailable {
                tool: self.name.to_string(),
            });
        }
        let Some(active) = state.active.clone() else {
            return Ok(None);
        };
        Ok(Some(ActiveToolchain {
            version: parse(&active)?,
            path: state.root.join(&active),
            name: active,
        }))
    }

    async fn list_installed(&self) -> Result<Vec<InstalledVersion>, BackendError> {
        let state = self.record(Call::ListInstalled);
        Ok(state
            .installed
            .iter()
            .map(|name| InstalledVersion {
                name: name.clone(),
                version: name.parse().ok(),
                handle: InstallHandle::Path(state.root.join(name)),
                is_active: state.active.as_ref() == Some(name),
            })
            .collect())
    }

    async fn resolve_latest(&self) -> Result<ToolchainVersion, BackendError> {
        let state = self.record(Call::ResolveLatest);
        parse(&state.latest.clone()?)
    }

    async fn install(&self, version: &ToolchainVersion) -> Result<InstallOutcome, BackendError> {
        let mut state = self.record(Call::Install(version.to_string()));
        if state.fail_install {
            return Err(BackendError::CommandFailed {
                program: "mock install".to_string(),
                code: "status 1".to_string(),
                stderr: "build failed".to_string(),
            });
        }
        let name = version.to_string();
        if state.installed.contains(&name) {
            return Ok(InstallOutcome::AlreadyPresent);
        }
        state.installed.push(name);
        Ok(InstallOutcome::Installed(InstallPath::VersionManager))
    }

    async fn activate(&self, version: &ToolchainVersion) -> Result<(), BackendError> {
        let mut state = self.record(Call::Activate(version.to_string()));
        if !state.ignore_activate {
            state.active = Some(version.to_string());
        }
        Ok(())
    }

    async fn uninstall(&self, installed: &InstalledVersion) -> Result<(), BackendError> {
        let mut state = self.record(Call::Uninstall(installed.name.clone()));
        if state.fail_uninstall.contains(&installed.name) {
            return Err(BackendError::CommandFailed {
                program: "mock uninstall".to_string(),
                code: "status 1".to_string(),
                stderr: "in use".to_string(),
            });
        }
        state.installed.retain(|name| *name != installed.name);
        Ok(())
    }

    fn package_variants(&self, _version: &ToolchainVersion) -> Vec<String> {
        self.state().variants.clone()
    }

    async fn installed_packages(&self) -> Result<Vec<PackageRequirement>, BackendError> {
        Ok(self.record(Call::InstalledPackages).packages.clone())
    }

    async fn list_tools(&self) -> Result<Vec<ToolBinary>, BackendError> {
        let state = self.record(Call::ListTools);
        Ok(state
            .tools
            .iter()
            .map(|(name, _)| ToolBinary {
                name: name.clone(),
                path: state.root.join("bin").join(name),
            })
            .collect())
    }

    async fn tool_origin(&self, tool: &ToolBinary) -> Result<Option<String>, BackendError> {
        Ok(self
            .state()
            .tools
            .iter()
            .find(|(name, _)| *name == tool.name)
            .and_then(|(_, origin)| origin.clone()))
    }

    async fn reinstall_tool(&self, package: &str) -> Result<(), BackendError> {
        self.record(Call::ReinstallTool(package.to_string()));
        Ok(())
    }
}

/// Package manager that only knows the packages it was told about. Each
/// package installs one fixed release, so a repository that lags behind
/// upstream can be modelled.
#[derive(Clone, Default)]
pub struct FakePackageManager {
    pub available: Vec<(String, String)>,
    pub installed: Arc<Mutex<BTreeMap<String, Vec<String>>>>,
    pub attempts: Arc<Mutex<Vec<String>>>,
}

impl FakePackageManager {
    pub fn with_available(available: &[(&str, &str)]) -> Self {
        Self {
            available: available
                .iter()
                .map(|(package, version)| ((*package).to_string(), (*version).to_string()))
                .collect(),
            ..Self::default()
        }
    }

    pub fn with_installed(self, package: &str, version: &str) -> Self {
        self.installed
            .lock()
            .expect("installed lock")
            .insert(package.to_string(), vec![version.to_string()]);
        self
    }

    pub fn attempts(&self) -> Vec<String> {
        self.attempts.lock().expect("attempts lock").clone()
    }
}

#[async_trait]
impl PackageManager for FakePackageManager {
    fn name(&self) -> &'static str {
        "fakebrew"
    }

    async fn list_installed(&self) -> Result<BTreeMap<String, Vec<String>>, BackendError> {
        Ok(self.installed.lock().expect("installed lock").clone())
    }

    async fn install(&self, package: &str) -> Result<PackageOutcome, BackendError> {
        self.attempts
            .lock()
            .expect("attempts lock")
            .push(package.to_string());
        let Some((_, version)) = self.available.iter().find(|(name, _)| name == package) else {
            return Err(BackendError::CommandFailed {
                program: "fakebrew install".to_string(),
                code: "status 1".to_string(),
                stderr: format!("No available formula with the name \"{package}\""),
            });
        };

        let mut installed = self.installed.lock().expect("installed lock");
        let versions = installed.entry(package.to_string()).or_default();
        if versions.last() == Some(version) {
            return Ok(PackageOutcome::AlreadyCurrent);
        }
        versions.push(version.clone());
        Ok(PackageOutcome::Installed)
    }

    async fn upgrade(&self, package: &str) -> Result<PackageOutcome, BackendError> {
        self.install(package).await
    }
}
