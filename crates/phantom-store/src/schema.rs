//! Column families of the `RocksDB` ledger.

/// Column family names.
pub mod cf {
    /// Buyer rows, keyed by `buyer_id`.
    pub const BUYERS: &str = "buyers";

    /// Seller rows, keyed by `seller_id`.
    pub const SELLERS: &str = "sellers";

    /// Product rows, keyed by `product_id`.
    pub const PRODUCTS: &str = "products";

    /// Index: products by seller, keyed by `seller_id || product_id`.
    /// Value is empty (index only).
    pub const PRODUCTS_BY_SELLER: &str = "products_by_seller";

    /// Purchase records, keyed by `purchase_id`. Append-only.
    pub const PURCHASES: &str = "purchases";

    /// Index: purchases by buyer, keyed by `buyer_id || purchase_id`.
    /// Value is empty (index only).
    pub const PURCHASES_BY_BUYER: &str = "purchases_by_buyer";
}

/// Returns all column family names for database initialization.
#[must_use]
pub fn all_column_families() -> Vec<&'static str> {
    vec![
        cf::BUYERS,
        cf::SELLERS,
        cf::PRODUCTS,
        cf::PRODUCTS_BY_SELLER,
        cf::PURCHASES,
        cf::PURCHASES_BY_BUYER,
    ]
}
