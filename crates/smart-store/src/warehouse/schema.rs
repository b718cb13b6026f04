//! Star schema of the sales warehouse.

/// Dimension and fact tables. Creation is idempotent.
pub const CREATE_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS customer (
    CustomerID INTEGER PRIMARY KEY,
    Name TEXT,
    Region TEXT,
    JoinDate TEXT,
    LoyaltyPoints INTEGER,
    CustomerSegment TEXT,
    LastPurchaseDate TEXT
);

CREATE TABLE IF NOT EXISTS product (
    ProductID INTEGER PRIMARY KEY,
    ProductName TEXT,
    Category TEXT,
    UnitPrice REAL,
    StockQuantity INTEGER,
    Supplier TEXT,
    AverageRating REAL
);

CREATE TABLE IF NOT EXISTS sale (
    TransactionID INTEGER PRIMARY KEY AUTOINCREMENT,
    SaleDate TEXT,
    CustomerID INTEGER,
    ProductID INTEGER,
    StoreID INTEGER,
    CampaignID INTEGER,
    SaleAmount REAL,
    DiscountPercent REAL,
    PaymentType TEXT,
    QuantitySold INTEGER,
    FOREIGN KEY (CustomerID) REFERENCES customer (CustomerID),
    FOREIGN KEY (ProductID) REFERENCES product (ProductID)
);
";

/// Tables in deletion order: the fact table before the dimensions it
/// references.
pub const DELETE_ORDER: [&str; 3] = ["sale", "customer", "product"];

/// Fact column defaulted when the prepared sales do not carry it.
pub const QUANTITY_SOLD: &str = "QuantitySold";

/// Value given to [`QUANTITY_SOLD`] when it is defaulted.
pub const DEFAULT_QUANTITY_SOLD: i64 = 1;

/// Quote an identifier for use in SQL.
pub(crate) fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Parameterized insert for the given columns.
pub(crate) fn insert_statement(table: &str, columns: &[String]) -> String {
    let names: Vec<String> = columns.iter().map(|c| quote_identifier(c)).collect();
    let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{}", i)).collect();
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_identifier(table),
        names.join(", "),
        placeholders.join(", ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_statement() {
        let sql = insert_statement("sale", &["SaleDate".to_string(), "QuantitySold".to_string()]);
        assert_eq!(
            sql,
            "INSERT INTO \"sale\" (\"SaleDate\", \"QuantitySold\") VALUES (?1, ?2)"
        );
    }

    #[test]
    fn test_quote_identifier_escapes_quotes() {
        assert_eq!(quote_identifier("a\"b"), "\"a\"\"b\"");
    }
}
