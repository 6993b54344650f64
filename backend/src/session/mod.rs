//! Workspace session.
//!
//! Holds everything one user works on: the loaded workbook, the selected
//! sheet and header row, the table built from them, and the active mapping.
//!
//! ```text
//! load_workbook ──▶ select(sheet, header_row) ──▶ CanonicalTable ─┐
//!                     (blocking task, latest                       │
//!                      request wins)                               ▼
//! edit rules / suggest(instruction) ──▶ MappingConfig ──▶ convert() ──▶ JSON
//! ```
//!
//! Readers always see a consistent snapshot: the table is swapped whole and
//! the rule list is replaced under the write lock. A selection that finishes
//! after a newer one was issued is dropped.

use serde::Serialize;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::ai::{accept_suggestions, MappingSuggester, SuggestionRequest};
use crate::api::logs::{log_info, log_success, log_warning};
use crate::error::{SessionError, SessionResult};
use crate::models::{CanonicalTable, TablePreview, PREVIEW_ROWS};
use crate::parser::{normalize, read_workbook_bytes, Workbook};
use crate::transform::executor::transform;
use crate::transform::mapping::{MappingConfig, MappingRule, RuleUpdate};

/// Result of [`Workspace::select`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectOutcome {
    /// The new table is now current.
    Committed,
    /// A newer selection was issued meanwhile; this result was dropped.
    Superseded,
}

/// Result of [`Workspace::suggest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuggestOutcome {
    /// The rules were replaced by this many suggested rules.
    Applied(usize),
    /// The suggester answered with nothing usable; rules unchanged.
    NoValidMapping,
    /// Blank instruction; no call was made.
    EmptyInstruction,
}

/// Snapshot of the workspace for display.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceStatus {
    pub file_name: Option<String>,
    pub sheets: Vec<String>,
    pub selected_sheet: Option<String>,
    pub header_row: usize,
    pub headers: Vec<String>,
    pub row_count: usize,
    pub rule_count: usize,
    /// Rules whose source column is not in the current headers
    pub dangling_rule_ids: Vec<String>,
}

#[derive(Debug)]
struct State {
    workbook: Option<Arc<Workbook>>,
    sheet: Option<String>,
    header_row: usize,
    table: Arc<CanonicalTable>,
    mapping: MappingConfig,
}

impl Default for State {
    fn default() -> Self {
        Self {
            workbook: None,
            sheet: None,
            header_row: 0,
            table: Arc::new(CanonicalTable::empty("")),
            mapping: MappingConfig::new(),
        }
    }
}

/// Shared editing session.
#[derive(Debug, Default)]
pub struct Workspace {
    state: RwLock<State>,
    generation: AtomicU64,
}

impl Workspace {
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Workbook and table
    // =========================================================================

    /// Read workbook bytes off the async runtime, then adopt the workbook.
    ///
    /// A read failure leaves the workspace as it was.
    pub async fn load_bytes(&self, bytes: Vec<u8>, file_name: &str) -> SessionResult<SelectOutcome> {
        let name = file_name.to_string();
        let workbook = tokio::task::spawn_blocking(move || read_workbook_bytes(&bytes, &name))
            .await
            .map_err(|e| SessionError::TaskFailed(e.to_string()))??;

        self.load_workbook(workbook).await
    }

    /// Adopt a workbook: the mapping is reset and the first sheet is
    /// selected at header row 0.
    pub async fn load_workbook(&self, workbook: Workbook) -> SessionResult<SelectOutcome> {
        let first = workbook.first_sheet_name().to_string();
        log_success(format!(
            "Loaded {} ({} sheet{})",
            workbook.file_name(),
            workbook.sheet_names().len(),
            if workbook.sheet_names().len() == 1 { "" } else { "s" }
        ));

        {
            let mut state = self.state.write().await;
            self.generation.fetch_add(1, Ordering::SeqCst);
            *state = State {
                table: Arc::new(CanonicalTable::empty(workbook.file_name())),
                workbook: Some(Arc::new(workbook)),
                ..State::default()
            };
        }

        self.select(&first, 0).await
    }

    /// Rebuild the table for `sheet` with `header_row` as the header.
    ///
    /// Normalization runs on a blocking task. If another selection, load or
    /// clear was issued before it finishes, the result is discarded.
    pub async fn select(&self, sheet: &str, header_row: usize) -> SessionResult<SelectOutcome> {
        // The ticket is issued under the same lock that read the workbook,
        // so a load or clear either precedes both or outdates the ticket.
        let (workbook, ticket) = {
            let state = self.state.read().await;
            let workbook = state.workbook.clone().ok_or(SessionError::NoWorkbook)?;
            if workbook.grid(sheet).is_none() {
                return Err(SessionError::UnknownSheet(sheet.to_string()));
            }
            (workbook, self.issue_ticket())
        };

        let sheet_name = sheet.to_string();
        let source = Arc::clone(&workbook);
        let table = tokio::task::spawn_blocking(move || {
            let grid = source.grid(&sheet_name).map(Vec::as_slice).unwrap_or(&[]);
            normalize(grid, header_row, source.file_name())
        })
        .await
        .map_err(|e| SessionError::TaskFailed(e.to_string()))?;

        let outcome = self.commit(ticket, &workbook, sheet, header_row, table).await;
        match outcome {
            SelectOutcome::Committed => log_info(format!(
                "Sheet \"{}\" with header row {} selected",
                sheet, header_row
            )),
            SelectOutcome::Superseded => {
                log_warning(format!("Selection of \"{}\" superseded", sheet))
            }
        }
        Ok(outcome)
    }

    fn issue_ticket(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Install `table` if `ticket` is still the latest and `source` is still
    /// the loaded workbook.
    async fn commit(
        &self,
        ticket: u64,
        source: &Arc<Workbook>,
        sheet: &str,
        header_row: usize,
        table: CanonicalTable,
    ) -> SelectOutcome {
        let mut state = self.state.write().await;
        let current = state
            .workbook
            .as_ref()
            .is_some_and(|w| Arc::ptr_eq(w, source));
        if !current || self.generation.load(Ordering::SeqCst) != ticket {
            return SelectOutcome::Superseded;
        }

        state.sheet = Some(sheet.to_string());
        state.header_row = header_row;
        state.table = Arc::new(table);
        SelectOutcome::Committed
    }

    /// Drop the workbook, the table and the rules.
    pub async fn clear(&self) {
        let mut state = self.state.write().await;
        self.generation.fetch_add(1, Ordering::SeqCst);
        *state = State::default();
    }

    pub async fn has_workbook(&self) -> bool {
        self.state.read().await.workbook.is_some()
    }

    /// Current table (empty when nothing is loaded).
    pub async fn table(&self) -> Arc<CanonicalTable> {
        Arc::clone(&self.state.read().await.table)
    }

    /// First rows of the current table.
    pub async fn preview(&self) -> SessionResult<TablePreview> {
        let state = self.state.read().await;
        if state.workbook.is_none() {
            return Err(SessionError::NoWorkbook);
        }
        Ok(state.table.preview(PREVIEW_ROWS))
    }

    pub async fn status(&self) -> WorkspaceStatus {
        let state = self.state.read().await;
        WorkspaceStatus {
            file_name: state.workbook.as_ref().map(|w| w.file_name().to_string()),
            sheets: state
                .workbook
                .as_ref()
                .map(|w| w.sheet_names())
                .unwrap_or_default(),
            selected_sheet: state.sheet.clone(),
            header_row: state.header_row,
            headers: state.table.headers.clone(),
            row_count: state.table.row_count(),
            rule_count: state.mapping.len(),
            dangling_rule_ids: state
                .mapping
                .dangling_rules(&state.table.headers)
                .into_iter()
                .map(|r| r.id.clone())
                .collect(),
        }
    }

    // =========================================================================
    // Rules
    // =========================================================================

    /// Snapshot of the active mapping.
    pub async fn rules(&self) -> MappingConfig {
        self.state.read().await.mapping.clone()
    }

    pub async fn set_rules(&self, mapping: MappingConfig) {
        self.state.write().await.mapping = mapping;
    }

    /// Append a blank rule and return it.
    pub async fn add_rule(&self) -> MappingRule {
        let mut state = self.state.write().await;
        let rule = MappingRule::blank();
        state.mapping.fields.push(rule.clone());
        rule
    }

    pub async fn remove_rule(&self, id: &str) -> SessionResult<()> {
        let mut state = self.state.write().await;
        if state.mapping.remove(id) {
            Ok(())
        } else {
            Err(SessionError::UnknownRule(id.to_string()))
        }
    }

    /// Apply a partial update and return the updated rule.
    pub async fn update_rule(&self, id: &str, update: RuleUpdate) -> SessionResult<MappingRule> {
        let mut state = self.state.write().await;
        if !state.mapping.update(id, update) {
            return Err(SessionError::UnknownRule(id.to_string()));
        }
        state
            .mapping
            .get(id)
            .cloned()
            .ok_or_else(|| SessionError::UnknownRule(id.to_string()))
    }

    /// Ask `suggester` for a mapping and adopt it.
    ///
    /// No lock is held while waiting. Candidates are checked against the
    /// headers current when the answer arrives. On error or an empty answer
    /// the existing rules stay as they are.
    pub async fn suggest<S: MappingSuggester>(
        &self,
        suggester: &S,
        instruction: &str,
    ) -> SessionResult<SuggestOutcome> {
        if instruction.trim().is_empty() {
            return Ok(SuggestOutcome::EmptyInstruction);
        }

        let headers = {
            let state = self.state.read().await;
            if state.workbook.is_none() {
                return Err(SessionError::NoWorkbook);
            }
            state.table.headers.clone()
        };

        log_info(format!("🤖 Requesting mapping for {} columns...", headers.len()));
        let request = SuggestionRequest::new(headers, instruction.trim());
        let candidates = suggester.suggest(&request).await.map_err(|e| {
            log_warning(format!("Suggestion failed, mapping unchanged: {}", e));
            SessionError::Ai(e)
        })?;

        let mut state = self.state.write().await;
        let rules = accept_suggestions(candidates, &state.table.headers);
        if rules.is_empty() {
            log_warning("No valid mapping produced, try a more detailed instruction");
            return Ok(SuggestOutcome::NoValidMapping);
        }

        let count = rules.len();
        state.mapping = MappingConfig::from_rules(rules);
        log_success(format!("Applied {} suggested fields", count));
        Ok(SuggestOutcome::Applied(count))
    }

    // =========================================================================
    // Conversion
    // =========================================================================

    /// Transform the current table with a snapshot of the current rules.
    pub async fn convert(&self) -> Vec<Value> {
        let (table, mapping) = {
            let state = self.state.read().await;
            (Arc::clone(&state.table), state.mapping.clone())
        };
        transform(&table, mapping.rules())
    }
}
