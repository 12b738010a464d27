use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

/// Normalize a human-readable header into a stable field key.
///
/// Lower-cases, drops everything except ASCII letters, digits, whitespace and
/// underscores, trims, then joins whitespace runs with `_`:
/// `"Order ID"` → `order_id`, `"Check In?"` → `check_in`,
/// `"Price (IDR)"` → `price_idr`.
pub fn normalize_header(header: &str) -> String {
    let kept: String = header
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || c.is_whitespace() || *c == '_')
        .collect();
    kept.split_whitespace().collect::<Vec<_>>().join("_")
}

/// Spreadsheet column letters for a zero-based index: 0 → `A`, 26 → `AA`.
pub fn column_letter(index: usize) -> String {
    let mut letters = Vec::new();
    let mut n = index + 1;
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(char::from(b'A' + rem as u8));
        n = (n - 1) / 26;
    }
    letters.iter().rev().collect()
}

/// Physical address of one cell.
///
/// `row` is one-based and counts the header row (row 1); `column` is
/// zero-based, matching header positions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CellRef {
    pub row: usize,
    pub column: usize,
}

impl CellRef {
    pub fn new(row: usize, column: usize) -> Self {
        Self { row, column }
    }

    /// Cell in the header row.
    pub fn header(column: usize) -> Self {
        Self { row: 1, column }
    }

    /// A1 notation, e.g. `C7`.
    pub fn a1(&self) -> String {
        format!("{}{}", column_letter(self.column), self.row)
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.a1())
    }
}

/// Raw grid of one table: the header row plus every data row, exactly as the
/// backend returned them. Rows may be shorter than the header row.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    /// Split a raw value grid into header row and data rows.
    pub fn from_grid(mut grid: Vec<Vec<String>>) -> Self {
        if grid.is_empty() {
            return Self::default();
        }
        let rows = grid.split_off(1);
        let headers = grid.pop().unwrap_or_default();
        Self { headers, rows }
    }

    /// Returns `true` if at least one header cell is non-blank.
    pub fn has_headers(&self) -> bool {
        self.headers.iter().any(|h| !h.trim().is_empty())
    }

    /// Zero-based column of the first header whose normalized key matches
    /// `header`'s normalized key.
    pub fn column_index(&self, header: &str) -> Option<usize> {
        let wanted = normalize_header(header);
        if wanted.is_empty() {
            return None;
        }
        self.headers
            .iter()
            .position(|h| normalize_header(h) == wanted)
    }

    /// Text of a physical cell; empty when the row is short or absent.
    pub fn cell(&self, cell: CellRef) -> &str {
        let row = match cell.row {
            0 => None,
            1 => Some(&self.headers),
            n => self.rows.get(n - 2),
        };
        row.and_then(|r| r.get(cell.column))
            .map(String::as_str)
            .unwrap_or("")
    }

    /// One-based physical row of the first data row whose `column` cell
    /// equals `value` (both sides trimmed).
    pub fn find_row(&self, column: usize, value: &str) -> Option<usize> {
        let wanted = value.trim();
        self.rows
            .iter()
            .position(|row| row.get(column).map(|v| v.trim()) == Some(wanted))
            .map(|index| index + 2)
    }

    /// Decode the data row at a one-based physical row number.
    pub fn record_at(&self, row: usize) -> Option<Record> {
        if row < 2 {
            return None;
        }
        self.rows.get(row - 2).map(|r| Record::decode(&self.headers, r))
    }

    /// Lay out a new data row against the current header row.
    ///
    /// Each `(header, value)` lands in the column whose normalized header
    /// matches; values for headers the table lacks are dropped and columns
    /// nobody named stay empty.
    pub fn layout_row(&self, fields: &[(&str, String)]) -> Vec<String> {
        let mut row = vec![String::new(); self.headers.len()];
        for (header, value) in fields {
            if let Some(column) = self.column_index(header) {
                row[column] = value.clone();
            }
        }
        row
    }

    /// Decode every data row.
    pub fn records(&self) -> Vec<Record> {
        self.rows
            .iter()
            .map(|row| Record::decode(&self.headers, row))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Immutable snapshot of one data row, keyed by normalized header.
///
/// Mutating a `Record` has no effect on the store; updates go through
/// [`crate::locator::Location::write`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Record {
    fields: BTreeMap<String, String>,
}

impl Record {
    /// Zip a data row against the header row. Blank headers are skipped,
    /// missing cells read as empty, and the first of duplicate headers wins.
    pub fn decode(headers: &[String], row: &[String]) -> Self {
        let mut fields = BTreeMap::new();
        for (index, header) in headers.iter().enumerate() {
            let key = normalize_header(header);
            if key.is_empty() || fields.contains_key(&key) {
                continue;
            }
            let value = row.get(index).cloned().unwrap_or_default();
            fields.insert(key, value);
        }
        Self { fields }
    }

    /// Build a record directly from key/value pairs.
    pub fn from_pairs<K: AsRef<str>, V: Into<String>>(pairs: impl IntoIterator<Item = (K, V)>) -> Self {
        let fields = pairs
            .into_iter()
            .map(|(k, v)| (normalize_header(k.as_ref()), v.into()))
            .collect();
        Self { fields }
    }

    /// Value of a field, trimmed. Accepts either the field key or the
    /// original header label. Absent fields read as `""`.
    pub fn get(&self, field: &str) -> &str {
        self.fields
            .get(&normalize_header(field))
            .map(|v| v.trim())
            .unwrap_or("")
    }

    /// First non-empty value among several alias fields.
    pub fn get_any(&self, fields: &[&str]) -> &str {
        fields
            .iter()
            .map(|f| self.get(f))
            .find(|v| !v.is_empty())
            .unwrap_or("")
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(&normalize_header(field))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn s(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn normalizes_sheet_headers() {
        assert_eq!(normalize_header("Order ID"), "order_id");
        assert_eq!(normalize_header("  Reservation   ID "), "reservation_id");
        assert_eq!(normalize_header("Check In?"), "check_in");
        assert_eq!(normalize_header("Price (IDR)"), "price_idr");
        assert_eq!(normalize_header("# Stok"), "stok");
        assert_eq!(normalize_header("price_new_member"), "price_new_member");
        assert_eq!(normalize_header("???"), "");
    }

    #[test]
    fn column_letters() {
        assert_eq!(column_letter(0), "A");
        assert_eq!(column_letter(25), "Z");
        assert_eq!(column_letter(26), "AA");
        assert_eq!(column_letter(27), "AB");
        assert_eq!(column_letter(701), "ZZ");
        assert_eq!(column_letter(702), "AAA");
        assert_eq!(column_letter(16_383), "XFD");
        assert_eq!(CellRef::new(7, 2).a1(), "C7");
    }

    #[test]
    fn short_rows_read_as_empty() {
        let table = Table::new(s(&["Order ID", "Item Name", "Status"]), vec![s(&["A1"])]);
        let record = &table.records()[0];
        assert_eq!(record.get("order_id"), "A1");
        assert_eq!(record.get("Item Name"), "");
        assert_eq!(record.get("status"), "");
        assert!(record.contains("status"));
        assert_eq!(record.get("not_a_column"), "");
    }

    #[test]
    fn blank_and_duplicate_headers() {
        let table = Table::new(s(&["Status", "", "status"]), vec![s(&["Paid", "x", "Pending"])]);
        let record = &table.records()[0];
        assert_eq!(record.len(), 1);
        assert_eq!(record.get("status"), "Paid");
    }

    #[test]
    fn from_grid_splits_header_row() {
        let table = Table::from_grid(vec![s(&["A", "B"]), s(&["1", "2"]), s(&["3"])]);
        assert_eq!(table.headers, s(&["A", "B"]));
        assert_eq!(table.len(), 2);
        assert!(Table::from_grid(vec![]).is_empty());
        assert!(!Table::from_grid(vec![]).has_headers());
    }

    #[test]
    fn find_row_is_one_based_and_skips_header() {
        let table = Table::new(
            s(&["Order ID", "Status"]),
            vec![s(&["AAA", "Paid"]), s(&[" BBB ", "Pending"]), s(&["BBB", "Dup"])],
        );
        assert_eq!(table.find_row(0, "AAA"), Some(2));
        assert_eq!(table.find_row(0, "BBB"), Some(3));
        assert_eq!(table.find_row(0, "Order ID"), None);
        assert_eq!(table.find_row(0, "ZZZ"), None);
        assert_eq!(table.cell(CellRef::new(3, 1)), "Pending");
        assert_eq!(table.cell(CellRef::new(9, 1)), "");
        assert_eq!(table.record_at(4).unwrap().get("status"), "Dup");
    }

    #[test]
    fn column_index_matches_normalized_keys() {
        let table = Table::new(s(&["Reservation ID", "Check In?", "Kavling"]), vec![]);
        assert_eq!(table.column_index("reservation_id"), Some(0));
        assert_eq!(table.column_index("Check In?"), Some(1));
        assert_eq!(table.column_index("check in"), Some(1));
        assert_eq!(table.column_index("Link Tiket"), None);
        assert_eq!(table.column_index(""), None);
    }

    #[test]
    fn layout_row_follows_live_header_order() {
        let table = Table::new(s(&["Status", "", "Order ID", "Notes"]), vec![]);
        let row = table.layout_row(&[
            ("Order ID", "AAA".to_string()),
            ("status", "Pending Payment".to_string()),
            ("Shipment Proof", "x".to_string()),
        ]);
        assert_eq!(row, s(&["Pending Payment", "", "AAA", ""]));
    }

    #[test]
    fn get_any_prefers_first_non_empty() {
        let record = Record::from_pairs([("title", ""), ("activity", "Kemah Akbar")]);
        assert_eq!(record.get_any(&["title", "activity", "name"]), "Kemah Akbar");
        assert_eq!(record.get_any(&["missing"]), "");
    }

    proptest! {
        #[test]
        fn normalized_keys_are_stable(header in "\\PC{0,40}") {
            let once = normalize_header(&header);
            prop_assert_eq!(normalize_header(&once), once.clone());
            prop_assert!(once.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_'));
        }
    }
}
