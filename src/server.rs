//! The `tower_lsp::LanguageServer` implementation.
//!
//! [`Backend`] owns the shared state (open documents, settings, the local
//! symbol cache and the pack index cache) and hands snapshots of it to the
//! provider functions.

use std::{collections::HashMap, path::PathBuf, sync::Arc};

use serde_json::Value;
use tokio::sync::RwLock;
use tower_lsp::{
    jsonrpc::{Error, Result},
    lsp_types::*,
    Client, LanguageServer,
};
use tracing::{debug, info, warn};

use crate::{
    commands::{self, DFP_INFO, LOOKUP_SYMBOL, REBUILD_DFP_INDEX},
    completion::{self, Context},
    config::{touches_section, Settings, SETTINGS_FILE, SETTINGS_SECTION},
    dfp::{is_project_file, DfpCache, DfpIndex},
    document::Document,
    gotodef, hover,
    local::{LocalSymbolCache, LocalSymbols},
    references, symbol,
    workspace::DiskWorkspace,
};

pub struct Backend {
    client: Client,
    documents: Arc<RwLock<HashMap<Url, Document>>>,
    settings: Arc<RwLock<Settings>>,
    /// Last `avrasm` section the client sent, re-applied after file settings
    client_settings: Arc<RwLock<Option<Value>>>,
    roots: Arc<RwLock<Vec<PathBuf>>>,
    local_cache: Arc<RwLock<LocalSymbolCache>>,
    dfp: Arc<DfpCache>,
}

impl Backend {
    pub fn new(client: Client) -> Backend {
        Backend {
            client,
            documents: Arc::new(RwLock::new(HashMap::new())),
            settings: Arc::new(RwLock::new(Settings::default())),
            client_settings: Arc::new(RwLock::new(None)),
            roots: Arc::new(RwLock::new(Vec::new())),
            local_cache: Arc::new(RwLock::new(LocalSymbolCache::default())),
            dfp: Arc::new(DfpCache::new()),
        }
    }

    async fn settings(&self) -> Settings {
        self.settings.read().await.clone()
    }

    async fn document(&self, uri: &Url) -> Option<Document> {
        self.documents.read().await.get(uri).cloned()
    }

    async fn local_symbols(&self, document: &Document) -> Arc<LocalSymbols> {
        self.local_cache
            .write()
            .await
            .get_or_parse(&document.uri, document.version, &document.text)
    }

    /// The pack index, built on first use after an invalidation.
    async fn dfp_index(&self, settings: &Settings) -> Option<Arc<DfpIndex>> {
        if !settings.enable_dfp {
            return None;
        }
        Some(self.build_dfp_index(settings).await)
    }

    async fn build_dfp_index(&self, settings: &Settings) -> Arc<DfpIndex> {
        let settings = settings.clone();
        let roots = self.roots.read().await.clone();
        self.dfp
            .get_or_build(move || DfpIndex::build(&settings, &roots))
            .await
    }

    async fn workspace(&self) -> DiskWorkspace {
        let roots = self.roots.read().await.clone();
        let open = self
            .documents
            .read()
            .await
            .values()
            .filter_map(|document| Some((document.path()?, document.text.clone())))
            .collect();
        DiskWorkspace::new(roots, open)
    }

    /// Defaults, then `.avrasm.json` in the first root, then the client's values.
    async fn reload_settings(&self) {
        let root = self.roots.read().await.first().cloned();
        let mut settings = match Settings::new(root.as_deref()) {
            Ok(settings) => settings,
            Err(err) => {
                warn!("failed to read settings files: {err:#}");
                Settings::default()
            }
        };

        if let Some(value) = self.client_settings.read().await.as_ref() {
            if let Err(err) = settings.apply_client_settings(value) {
                warn!("ignoring malformed client settings: {err:#}");
                self.client
                    .log_message(
                        MessageType::WARNING,
                        format!("avrasm: ignoring malformed settings: {err:#}"),
                    )
                    .await;
            }
        }

        info!(?settings, "settings loaded");
        *self.settings.write().await = settings;
    }

    /// Ask the client for the `avrasm` section (pull model).
    async fn pull_client_settings(&self) {
        let items = vec![ConfigurationItem {
            scope_uri: None,
            section: Some(SETTINGS_SECTION.to_string()),
        }];
        match self.client.configuration(items).await {
            Ok(mut values) if !values.is_empty() => {
                let value = values.swap_remove(0);
                if !value.is_null() {
                    *self.client_settings.write().await = Some(value);
                }
            }
            Ok(_) => {}
            Err(err) => debug!("client did not answer workspace/configuration: {err}"),
        }
    }

    async fn configuration_changed(&self) {
        self.reload_settings().await;
        self.dfp.invalidate();
    }

    async fn register_file_watchers(&self) {
        let watchers = ["**/*.mplab.json", "**/.avrasm.json"]
            .into_iter()
            .map(|glob| FileSystemWatcher {
                glob_pattern: GlobPattern::String(glob.to_string()),
                kind: None,
            })
            .collect();
        let registration = Registration {
            id: "avrasm-watched-files".to_string(),
            method: "workspace/didChangeWatchedFiles".to_string(),
            register_options: serde_json::to_value(DidChangeWatchedFilesRegistrationOptions {
                watchers,
            })
            .ok(),
        };

        if let Err(err) = self.client.register_capability(vec![registration]).await {
            debug!("file watcher registration failed: {err}");
        }
    }

    async fn lookup_command(&self, arguments: &[Value]) -> Result<Option<Value>> {
        let args = commands::parse_lookup_args(arguments)
            .ok_or_else(|| Error::invalid_params("expected arguments [symbol, uri?]"))?;

        let settings = self.settings().await;
        let document = match &args.uri {
            Some(uri) => self.document(uri).await,
            None => None,
        };
        let local = match &document {
            Some(document) => Some(self.local_symbols(document).await),
            None => None,
        };
        let index = self.dfp_index(&settings).await;

        let items = commands::lookup_symbol(
            &args.symbol,
            document
                .as_ref()
                .zip(local.as_deref())
                .map(|(document, local)| (&document.uri, local)),
            index.as_deref(),
        );
        info!(symbol = %args.symbol, results = items.len(), "lookup");

        serde_json::to_value(items)
            .map(Some)
            .map_err(|_| Error::internal_error())
    }

    async fn rebuild_command(&self) -> Result<Option<Value>> {
        let settings = self.settings().await;
        self.dfp.invalidate();
        let index = self.build_dfp_index(&settings).await;
        let summary = index.summary();

        let (kind, message) = commands::rebuild_message(&summary);
        self.client.show_message(kind, message).await;

        serde_json::to_value(summary)
            .map(Some)
            .map_err(|_| Error::internal_error())
    }
}

fn workspace_roots(params: &InitializeParams) -> Vec<PathBuf> {
    if let Some(folders) = &params.workspace_folders {
        return folders
            .iter()
            .filter_map(|folder| folder.uri.to_file_path().ok())
            .collect();
    }

    #[allow(deprecated)]
    params
        .root_uri
        .as_ref()
        .and_then(|uri| uri.to_file_path().ok())
        .into_iter()
        .collect()
}

/// What a `workspace/didChangeConfiguration` payload asks of us.
#[derive(Debug, PartialEq)]
enum ConfigurationUpdate {
    Ignore,
    /// Push model: the payload carries the settings
    Store(Value),
    /// Pull model: ask with `workspace/configuration`
    Pull,
}

fn configuration_update(settings: Value) -> ConfigurationUpdate {
    if !touches_section(&settings) {
        return ConfigurationUpdate::Ignore;
    }
    match settings {
        Value::Object(map) if !map.is_empty() => ConfigurationUpdate::Store(Value::Object(map)),
        _ => ConfigurationUpdate::Pull,
    }
}

fn is_settings_file(uri: &Url) -> bool {
    uri.path().ends_with(SETTINGS_FILE)
}

#[tower_lsp::async_trait]
impl LanguageServer for Backend {
    async fn initialize(&self, params: InitializeParams) -> Result<InitializeResult> {
        *self.roots.write().await = workspace_roots(&params);
        if let Some(options) = params.initialization_options.clone() {
            *self.client_settings.write().await = Some(options);
        }
        self.reload_settings().await;

        Ok(InitializeResult {
            capabilities: ServerCapabilities {
                text_document_sync: Some(TextDocumentSyncCapability::Options(
                    TextDocumentSyncOptions {
                        open_close: Some(true),
                        change: Some(TextDocumentSyncKind::FULL),
                        save: Some(TextDocumentSyncSaveOptions::Supported(true)),
                        ..Default::default()
                    },
                )),
                hover_provider: Some(HoverProviderCapability::Simple(true)),
                definition_provider: Some(OneOf::Left(true)),
                references_provider: Some(OneOf::Left(true)),
                document_symbol_provider: Some(OneOf::Left(true)),
                workspace_symbol_provider: Some(OneOf::Left(true)),
                completion_provider: Some(CompletionOptions {
                    resolve_provider: Some(false),
                    trigger_characters: Some(vec![",".into(), " ".into(), ".".into()]),
                    ..Default::default()
                }),
                execute_command_provider: Some(ExecuteCommandOptions {
                    commands: commands::all(),
                    ..Default::default()
                }),
                ..Default::default()
            },
            server_info: Some(ServerInfo {
                name: env!("CARGO_PKG_NAME").to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
        })
    }

    async fn initialized(&self, _: InitializedParams) {
        self.pull_client_settings().await;
        self.reload_settings().await;
        self.register_file_watchers().await;

        self.client
            .log_message(MessageType::INFO, "avrasm-lsp initialized")
            .await;
    }

    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let item = params.text_document;
        debug!(uri = %item.uri, "did_open");
        let document = Document::new(item.uri.clone(), item.version, item.text);
        self.documents.write().await.insert(item.uri, document);
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        let Some(change) = params.content_changes.into_iter().last() else {
            return;
        };
        let uri = params.text_document.uri;
        let document = Document::new(uri.clone(), params.text_document.version, change.text);
        self.documents.write().await.insert(uri, document);
    }

    async fn did_save(&self, params: DidSaveTextDocumentParams) {
        let uri = params.text_document.uri;
        if let Ok(path) = uri.to_file_path() {
            if is_project_file(&path) {
                info!(path = %path.display(), "project file saved");
                self.dfp.invalidate();
            }
        }
        if is_settings_file(&uri) {
            self.configuration_changed().await;
        }
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        let uri = params.text_document.uri;
        self.documents.write().await.remove(&uri);
        self.local_cache.write().await.evict(&uri);
    }

    async fn did_change_configuration(&self, params: DidChangeConfigurationParams) {
        match configuration_update(params.settings) {
            ConfigurationUpdate::Ignore => {
                debug!("configuration change outside the avrasm section");
                return;
            }
            ConfigurationUpdate::Store(value) => {
                *self.client_settings.write().await = Some(value);
            }
            ConfigurationUpdate::Pull => self.pull_client_settings().await,
        }

        info!("configuration changed");
        self.configuration_changed().await;
    }

    async fn did_change_watched_files(&self, params: DidChangeWatchedFilesParams) {
        let settings_changed = params.changes.iter().any(|change| is_settings_file(&change.uri));
        let project_changed = params.changes.iter().any(|change| {
            change
                .uri
                .to_file_path()
                .map(|path| is_project_file(&path))
                .unwrap_or(false)
        });

        if settings_changed {
            self.configuration_changed().await;
        } else if project_changed {
            self.dfp.invalidate();
        }
    }

    async fn hover(&self, params: HoverParams) -> Result<Option<Hover>> {
        let settings = self.settings().await;
        if !settings.enable_hover {
            return Ok(None);
        }
        let position = params.text_document_position_params;
        let Some(document) = self.document(&position.text_document.uri).await else {
            return Ok(None);
        };

        let local = self.local_symbols(&document).await;
        let index = self.dfp_index(&settings).await;
        Ok(hover::hover(
            &document,
            &local,
            index.as_deref(),
            position.position,
            &settings,
        ))
    }

    async fn goto_definition(
        &self,
        params: GotoDefinitionParams,
    ) -> Result<Option<GotoDefinitionResponse>> {
        let settings = self.settings().await;
        if !settings.enable_definition {
            return Ok(None);
        }
        let position = params.text_document_position_params;
        let Some(document) = self.document(&position.text_document.uri).await else {
            return Ok(None);
        };

        let local = self.local_symbols(&document).await;
        let index = self.dfp_index(&settings).await;
        Ok(gotodef::goto_definition(
            &document,
            &local,
            index.as_deref(),
            position.position,
            &settings,
        )
        .map(GotoDefinitionResponse::Array))
    }

    async fn completion(&self, params: CompletionParams) -> Result<Option<CompletionResponse>> {
        let settings = self.settings().await;
        if !settings.enable_completion {
            return Ok(None);
        }
        let position = params.text_document_position;
        let Some(document) = self.document(&position.text_document.uri).await else {
            return Ok(None);
        };

        let local = self.local_symbols(&document).await;
        let index = self.dfp_index(&settings).await;
        let context = Context {
            document: &document,
            local: &local,
            dfp: index.as_deref(),
            settings: &settings,
        };
        Ok(completion::get_completions(context, position.position))
    }

    async fn document_symbol(
        &self,
        params: DocumentSymbolParams,
    ) -> Result<Option<DocumentSymbolResponse>> {
        let settings = self.settings().await;
        let Some(document) = self.document(&params.text_document.uri).await else {
            return Ok(None);
        };
        let local = self.local_symbols(&document).await;
        Ok(symbol::document_symbol(&local, &settings))
    }

    async fn symbol(
        &self,
        params: WorkspaceSymbolParams,
    ) -> Result<Option<Vec<SymbolInformation>>> {
        let settings = self.settings().await;
        let workspace = self.workspace().await;
        let query = params.query;

        let found = tokio::task::spawn_blocking(move || {
            symbol::workspace_symbol(&workspace, &query, &settings)
        })
        .await
        .unwrap_or_else(|err| {
            warn!("workspace symbol search failed: {err}");
            None
        });
        Ok(found)
    }

    async fn references(&self, params: ReferenceParams) -> Result<Option<Vec<Location>>> {
        let settings = self.settings().await;
        let position = params.text_document_position;
        let Some(document) = self.document(&position.text_document.uri).await else {
            return Ok(None);
        };
        let workspace = self.workspace().await;
        let include_declaration = params.context.include_declaration;

        let found = tokio::task::spawn_blocking(move || {
            references::references(
                &workspace,
                &document,
                position.position,
                include_declaration,
                &settings,
            )
        })
        .await
        .unwrap_or_else(|err| {
            warn!("reference search failed: {err}");
            None
        });
        Ok(found)
    }

    async fn execute_command(&self, params: ExecuteCommandParams) -> Result<Option<Value>> {
        debug!(command = %params.command, "execute_command");
        match params.command.as_str() {
            LOOKUP_SYMBOL => self.lookup_command(&params.arguments).await,
            REBUILD_DFP_INDEX => self.rebuild_command().await,
            DFP_INFO => {
                let summary = self.dfp.current().await.map(|index| index.summary());
                serde_json::to_value(summary)
                    .map(Some)
                    .map_err(|_| Error::internal_error())
            }
            command => Err(Error::invalid_params(format!("unknown command {command}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn settings_and_project_files_are_recognized() {
        assert!(is_settings_file(
            &Url::parse("file:///work/.avrasm.json").unwrap()
        ));
        assert!(!is_settings_file(
            &Url::parse("file:///work/main.asm").unwrap()
        ));
    }

    #[test]
    fn configuration_payloads() {
        assert_eq!(
            configuration_update(json!({ "editor": { "tabSize": 4 } })),
            ConfigurationUpdate::Ignore
        );
        assert_eq!(configuration_update(Value::Null), ConfigurationUpdate::Pull);
        assert_eq!(configuration_update(json!({})), ConfigurationUpdate::Pull);
        assert_eq!(
            configuration_update(json!({ "avrasm": { "device": "ATtiny85" } })),
            ConfigurationUpdate::Store(json!({ "avrasm": { "device": "ATtiny85" } }))
        );
    }

    #[tokio::test]
    async fn avrasm_configuration_change_drops_the_index() {
        let (service, _socket) = tower_lsp::LspService::new(Backend::new);
        let backend = service.inner();
        backend.dfp.get_or_build(DfpIndex::empty).await;

        backend
            .did_change_configuration(DidChangeConfigurationParams {
                settings: json!({ "editor": { "tabSize": 4 } }),
            })
            .await;
        assert!(backend.dfp.current().await.is_some());
        assert!(backend.settings().await.enable_hover);

        backend
            .did_change_configuration(DidChangeConfigurationParams {
                settings: json!({ "avrasm": { "enableHover": false } }),
            })
            .await;
        assert!(backend.dfp.current().await.is_none());
        assert!(!backend.settings().await.enable_hover);
        assert_eq!(backend.dfp.build_count(), 1);
    }

    #[test]
    fn roots_prefer_workspace_folders() {
        #[allow(deprecated)]
        let params = InitializeParams {
            root_uri: Some(Url::parse("file:///fallback").unwrap()),
            workspace_folders: Some(vec![WorkspaceFolder {
                uri: Url::parse("file:///work").unwrap(),
                name: "work".to_string(),
            }]),
            ..Default::default()
        };
        assert_eq!(workspace_roots(&params), vec![PathBuf::from("/work")]);

        #[allow(deprecated)]
        let params = InitializeParams {
            root_uri: Some(Url::parse("file:///fallback").unwrap()),
            ..Default::default()
        };
        assert_eq!(workspace_roots(&params), vec![PathBuf::from("/fallback")]);
    }
}
