//! Ephemeral presentation state: sort order, filter, paging and the suggestion cursor.
//!
//! None of this is session state. It is derived against whatever snapshot is being
//! rendered and resets itself when the dataset version moves.

use std::sync::Arc;

use wrangle_engine::{Dataset, DatasetVersion, SessionState, Suggestion};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub column: String,
    pub descending: bool,
}

/// Filtered and sorted row order, valid for one (version, filter, sort) triple.
#[derive(Debug, Clone)]
struct RowCache {
    version: DatasetVersion,
    filter: String,
    sort: Option<SortKey>,
    rows: Arc<[usize]>,
}

#[derive(Debug, Clone)]
pub struct ViewState {
    sort: Option<SortKey>,
    filter: String,
    page: usize,
    page_size: usize,
    cursor: usize,
    seen: Option<DatasetVersion>,
    rows: Option<RowCache>,
}

impl ViewState {
    #[must_use]
    pub fn new(page_size: usize) -> Self {
        Self {
            sort: None,
            filter: String::new(),
            page: 0,
            page_size: page_size.max(1),
            cursor: 0,
            seen: None,
            rows: None,
        }
    }

    #[must_use]
    pub fn sort(&self) -> Option<&SortKey> {
        self.sort.as_ref()
    }

    #[must_use]
    pub fn filter(&self) -> &str {
        &self.filter
    }

    #[must_use]
    pub fn page(&self) -> usize {
        self.page
    }

    #[must_use]
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    #[must_use]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Bring the view in line with a new snapshot.
    ///
    /// A dataset version change sends paging and the cursor back to the top and drops a
    /// sort whose column no longer exists. The cursor is always clamped to the batch.
    pub fn observe(&mut self, state: &SessionState) {
        let version = state.version();
        if self.seen != Some(version) {
            self.seen = Some(version);
            self.page = 0;
            self.cursor = 0;
            let columns = state.dataset().map(|d| d.columns());
            if let Some(sort) = &self.sort
                && !columns.is_some_and(|cols| cols.contains(&sort.column))
            {
                self.sort = None;
            }
        }
        let len = state.suggestions().len();
        self.cursor = self.cursor.min(len.saturating_sub(1));
    }

    /// Row indices of `state`'s dataset that pass the filter, in display order.
    ///
    /// Cached until the dataset version, the filter or the sort changes.
    pub fn visible_rows(&mut self, state: &SessionState) -> Arc<[usize]> {
        match state.dataset() {
            Some(dataset) => self.rows_for(state.version(), dataset),
            None => Arc::from([]),
        }
    }

    fn rows_for(&mut self, version: DatasetVersion, dataset: &Dataset) -> Arc<[usize]> {
        if let Some(cache) = &self.rows
            && cache.version == version
            && cache.filter == self.filter
            && cache.sort == self.sort
        {
            return Arc::clone(&cache.rows);
        }

        let rows: Arc<[usize]> = filter_and_sort(dataset, &self.filter, self.sort.as_ref()).into();
        self.rows = Some(RowCache {
            version,
            filter: self.filter.clone(),
            sort: self.sort.clone(),
            rows: Arc::clone(&rows),
        });
        rows
    }

    #[must_use]
    pub fn page_count(&self, total_rows: usize) -> usize {
        total_rows.div_ceil(self.page_size).max(1)
    }

    /// The slice of `rows` shown on the current page. The page is clamped, so a
    /// filter that shrinks the row set never leaves the view past the end.
    #[must_use]
    pub fn page_of<'a>(&self, rows: &'a [usize]) -> &'a [usize] {
        let page = self.page.min(self.page_count(rows.len()) - 1);
        let start = page * self.page_size;
        let end = (start + self.page_size).min(rows.len());
        &rows[start.min(end)..end]
    }

    pub fn next_page(&mut self, total_rows: usize) {
        let last = self.page_count(total_rows) - 1;
        self.page = (self.page + 1).min(last);
    }

    pub fn prev_page(&mut self) {
        self.page = self.page.saturating_sub(1);
    }

    /// Advance the sort column: unsorted, then each column in order, then unsorted
    /// again. The direction is kept while cycling.
    pub fn cycle_sort(&mut self, columns: &[String]) {
        let descending = self.sort.as_ref().is_some_and(|s| s.descending);
        let next = match &self.sort {
            None => columns.first(),
            Some(current) => columns
                .iter()
                .position(|c| c == &current.column)
                .and_then(|i| columns.get(i + 1)),
        };
        self.sort = next.map(|column| SortKey {
            column: column.clone(),
            descending,
        });
        self.page = 0;
    }

    pub fn toggle_sort_direction(&mut self) {
        if let Some(sort) = &mut self.sort {
            sort.descending = !sort.descending;
            self.page = 0;
        }
    }

    pub fn set_filter(&mut self, filter: impl Into<String>) {
        self.filter = filter.into();
        self.page = 0;
    }

    pub fn cursor_up(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn cursor_down(&mut self, len: usize) {
        if len > 0 {
            self.cursor = (self.cursor + 1).min(len - 1);
        }
    }

    /// Suggestion under the cursor in `state`'s current batch.
    #[must_use]
    pub fn cursor_suggestion<'a>(&self, state: &'a SessionState) -> Option<&'a Suggestion> {
        state.suggestions().as_slice().get(self.cursor)
    }
}

fn filter_and_sort(dataset: &Dataset, filter: &str, sort: Option<&SortKey>) -> Vec<usize> {
    let needle = filter.trim().to_lowercase();
    let mut rows: Vec<usize> = dataset
        .records()
        .iter()
        .enumerate()
        .filter(|(_, record)| {
            needle.is_empty()
                || dataset
                    .columns()
                    .iter()
                    .any(|col| record.get(col).display().to_lowercase().contains(&needle))
        })
        .map(|(i, _)| i)
        .collect();

    if let Some(sort) = sort {
        rows.sort_by(|&a, &b| {
            let ord = dataset
                .cell(a, &sort.column)
                .sort_cmp(dataset.cell(b, &sort.column));
            if sort.descending { ord.reverse() } else { ord }
        });
    }
    rows
}

impl Default for ViewState {
    fn default() -> Self {
        Self::new(wrangle_engine::DEFAULT_PAGE_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use wrangle_engine::{Dataset, DatasetVersion, Record};

    use super::{SortKey, ViewState};
    use crate::testing::{ready_state, reload};

    fn mixed() -> Dataset {
        let records = vec![
            Record::new().with("id", 10).with("city", "Lansdale"),
            Record::new().with("id", 9).with("city", "ambler"),
            Record::new().with("city", "Norristown"),
            Record::new().with("id", 100).with("city", "Lower Merion"),
        ];
        Dataset::normalized(vec!["id".into(), "city".into()], records).0
    }

    #[test]
    fn numbers_sort_numerically_with_nulls_first() {
        let dataset = mixed();
        let mut view = ViewState::new(10);
        view.cycle_sort(dataset.columns());
        assert_eq!(
            view.sort(),
            Some(&SortKey {
                column: "id".into(),
                descending: false
            })
        );
        assert_eq!(view.rows_for(DatasetVersion::INITIAL, &dataset), [2, 1, 0, 3].into());

        view.toggle_sort_direction();
        assert_eq!(view.rows_for(DatasetVersion::INITIAL, &dataset), [3, 0, 1, 2].into());
    }

    #[test]
    fn cycle_sort_wraps_to_unsorted_and_keeps_direction() {
        let dataset = mixed();
        let mut view = ViewState::new(10);
        view.cycle_sort(dataset.columns());
        view.toggle_sort_direction();
        view.cycle_sort(dataset.columns());
        assert_eq!(view.sort().unwrap().column, "city");
        assert!(view.sort().unwrap().descending);
        view.cycle_sort(dataset.columns());
        assert!(view.sort().is_none());
        assert_eq!(view.rows_for(DatasetVersion::INITIAL, &dataset), [0, 1, 2, 3].into());
    }

    #[test]
    fn filter_is_case_insensitive_across_cells() {
        let dataset = mixed();
        let mut view = ViewState::new(10);
        view.set_filter("AMB");
        assert_eq!(view.rows_for(DatasetVersion::INITIAL, &dataset), [1].into());
        view.set_filter("10");
        assert_eq!(view.rows_for(DatasetVersion::INITIAL, &dataset), [0, 3].into());
        view.set_filter("  ");
        assert_eq!(view.rows_for(DatasetVersion::INITIAL, &dataset).len(), 4);
    }

    #[test]
    fn row_order_is_reused_until_its_inputs_change() {
        let state = ready_state(6, 1);
        let mut view = ViewState::new(10);

        let first = view.visible_rows(&state);
        assert_eq!(first.len(), 6);
        assert!(Arc::ptr_eq(&first, &view.visible_rows(&state)));

        view.set_filter("19528");
        let filtered = view.visible_rows(&state);
        assert!(!Arc::ptr_eq(&first, &filtered));
        assert_eq!(&filtered[..], [3]);
        assert!(Arc::ptr_eq(&filtered, &view.visible_rows(&state)));

        view.set_filter("");
        view.cycle_sort(state.dataset().unwrap().columns());
        view.toggle_sort_direction();
        let sorted = view.visible_rows(&state);
        assert_eq!(&sorted[..], [5, 4, 3, 2, 1, 0]);

        // Same filter and sort, new dataset version: recomputed for the new rows.
        let reloaded = reload(&state, 2, 1);
        let after_reload = view.visible_rows(&reloaded);
        assert!(!Arc::ptr_eq(&sorted, &after_reload));
        assert_eq!(after_reload.len(), 2);
    }

    #[test]
    fn no_dataset_means_no_rows() {
        let mut view = ViewState::new(10);
        assert!(view.visible_rows(&wrangle_engine::SessionState::new()).is_empty());
    }

    #[test]
    fn paging_clamps_at_both_ends() {
        let rows: Vec<usize> = (0..5).collect();
        let mut view = ViewState::new(2);
        assert_eq!(view.page_count(rows.len()), 3);
        assert_eq!(view.page_of(&rows), [0, 1]);
        view.next_page(rows.len());
        view.next_page(rows.len());
        view.next_page(rows.len());
        assert_eq!(view.page(), 2);
        assert_eq!(view.page_of(&rows), [4]);
        // A shrinking row set never leaves the page past the end.
        assert_eq!(view.page_of(&rows[..3]), [2]);
        view.prev_page();
        view.prev_page();
        view.prev_page();
        assert_eq!(view.page(), 0);
        assert_eq!(view.page_count(0), 1);
        assert!(view.page_of(&[]).is_empty());
    }

    #[test]
    fn version_change_resets_page_and_cursor() {
        let state = ready_state(120, 3);
        let mut view = ViewState::new(50);
        view.observe(&state);
        view.next_page(120);
        view.cursor_down(3);
        view.cursor_down(3);
        view.cursor_down(3);
        assert_eq!(view.cursor(), 2);

        // Same version: nothing moves.
        view.observe(&state);
        assert_eq!((view.page(), view.cursor()), (1, 2));

        let reloaded = reload(&state, 10, 1);
        view.observe(&reloaded);
        assert_eq!((view.page(), view.cursor()), (0, 0));
    }

    #[test]
    fn sort_on_vanished_column_is_dropped() {
        let state = ready_state(5, 1);
        let mut view = ViewState::new(50);
        view.observe(&state);
        view.cycle_sort(&["gone".to_string()]);
        assert!(view.sort().is_some());
        view.observe(&reload(&state, 5, 1));
        assert!(view.sort().is_none());
    }

    #[test]
    fn cursor_tracks_batch() {
        let state = ready_state(3, 2);
        let mut view = ViewState::new(50);
        view.observe(&state);
        assert_eq!(view.cursor_suggestion(&state).unwrap().id().as_str(), "1");
        view.cursor_down(2);
        assert_eq!(view.cursor_suggestion(&state).unwrap().id().as_str(), "2");
        view.cursor_up();
        view.cursor_up();
        assert_eq!(view.cursor(), 0);
    }
}
