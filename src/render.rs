//! Text rendering of the month view.

use crate::store::CalendarStore;
use std::fmt::Write;

const WEEKDAYS: [&str; 7] = ["Su", "Mo", "Tu", "We", "Th", "Fr", "Sa"];
const CELL: usize = 5;

/// Draws the displayed month as a grid, one cell per day, starting on Sunday.
///
/// Today is wrapped in brackets and a day with a saved amount carries a `*`, e.g.
///
/// ```text
///             March 2024
///  Su   Mo   Tu   We   Th   Fr   Sa
///                            1    2
///   3    4    5*   6    7    8    9
///  10   11  [12]* 13   14   15   16
/// ```
pub fn month_grid(store: &CalendarStore) -> String {
    let mut out = String::new();
    let width = CELL * 7;
    let title = store.view().first_day().format("%B %Y").to_string();
    let _ = writeln!(out, "{title:^width$}");
    let header: Vec<String> = WEEKDAYS.iter().map(|d| format!(" {d:<3} ")).collect();
    let _ = writeln!(out, "{}", header.join("").trim_end());

    let leading = store.first_weekday_of_month() as usize;
    let mut cells: Vec<String> = vec![" ".repeat(CELL); leading];
    cells.extend((1..=store.days_in_month()).map(|day| day_cell(store, day)));

    for week in cells.chunks(7) {
        let _ = writeln!(out, "{}", week.join("").trim_end());
    }
    out
}

fn day_cell(store: &CalendarStore, day: u32) -> String {
    let mark = if store.has_entry(day) { "*" } else { " " };
    if store.is_today(day) {
        format!("[{day:>2}]{mark}")
    } else {
        format!(" {day:>2}{mark} ")
    }
}

/// The total across every month and the number of saved days in the displayed month.
pub fn summary(store: &CalendarStore) -> String {
    format!(
        "Total saved: {}\nDays saved in {}: {}",
        store.total_for_all_entries(),
        store.view(),
        store.entry_count_for_view_month()
    )
}

/// The full month view: grid, then summary.
pub fn month_view(store: &CalendarStore) -> String {
    format!("{}\n{}", month_grid(store), summary(store))
}

/// The editor line, or `None` when no editor is open.
pub fn editor_prompt(store: &CalendarStore) -> Option<String> {
    let editor = store.editor()?;
    let current = match editor.candidate() {
        "" => String::new(),
        c => format!(" [{c}]"),
    };
    Some(format!(
        "Amount for {}{current} (empty deletes, 'c' cancels): ",
        editor.key()
    ))
}
