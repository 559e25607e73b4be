//! Domain types for the storefront inventory and checkout core.
//!
//! Value objects and entities shared by the storage traits, the Postgres and
//! in-memory backends, and the HTTP layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

macro_rules! uuid_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random id
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wrap an existing `Uuid`
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Get the inner UUID
            #[must_use]
            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

uuid_id!(
    /// Unique identifier for a product
    ProductId
);
uuid_id!(
    /// Unique identifier for a cart
    CartId
);
uuid_id!(
    /// Unique identifier for a cart line item
    CartLineId
);
uuid_id!(
    /// Unique identifier for a checkout session
    SessionId
);
uuid_id!(
    /// Unique identifier for a user account
    UserId
);
uuid_id!(
    /// Opaque token identifying a guest cart
    CartToken
);

// ============================================================================
// Stock ledger
// ============================================================================

/// Why a stock delta was recorded.
///
/// Closed set: downstream reporting switches on these exhaustively, so free-form
/// reasons are rejected at the boundary (`LedgerReason::parse`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerReason {
    /// First stock count when a product is created
    Initial,
    /// Manual adjustment by an operator
    ManualAdjust,
    /// Stock held against an active checkout session
    OrderHold,
    /// Hold returned when a session leaves the active state
    OrderRelease,
    /// Customer return processed back into stock
    Return,
    /// Stocktake result (a zero delta is a valid "confirmed, no change" record)
    Recount,
}

impl LedgerReason {
    /// Stable wire/database representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Initial => "initial",
            Self::ManualAdjust => "manual_adjust",
            Self::OrderHold => "order_hold",
            Self::OrderRelease => "order_release",
            Self::Return => "return",
            Self::Recount => "recount",
        }
    }

    /// Parse the wire representation. Returns `None` for anything outside the
    /// six enumerated kinds.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "initial" => Some(Self::Initial),
            "manual_adjust" => Some(Self::ManualAdjust),
            "order_hold" => Some(Self::OrderHold),
            "order_release" => Some(Self::OrderRelease),
            "return" => Some(Self::Return),
            "recount" => Some(Self::Recount),
            _ => None,
        }
    }
}

impl fmt::Display for LedgerReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One immutable row of the append-only stock ledger.
///
/// The running sum of `delta` over all entries for a product equals the
/// product's current on-hand quantity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLedgerEntry {
    /// Entry id
    pub id: Uuid,
    /// Product the delta applies to
    pub product_id: ProductId,
    /// Signed quantity change (zero is allowed for recount confirmations)
    pub delta: i64,
    /// Why the delta was recorded
    pub reason: LedgerReason,
    /// Free-text note, at most 255 characters
    pub note: Option<String>,
    /// Operator or system actor that recorded the entry
    pub created_by: Option<UserId>,
    /// When the entry was recorded
    pub created_at: DateTime<Utc>,
}

/// Current on-hand quantity for a product, derived from the ledger.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLevel {
    /// Product this level belongs to
    pub product_id: ProductId,
    /// Current on-hand quantity (ledger sum; may be transiently negative)
    pub quantity: i64,
    /// Threshold at or below which the product counts as low on stock
    pub low_stock_threshold: i64,
}

impl StockLevel {
    /// Quantity is at or below the configured threshold.
    #[must_use]
    pub const fn is_low_stock(&self) -> bool {
        self.quantity <= self.low_stock_threshold
    }

    /// Nothing left to sell.
    #[must_use]
    pub const fn is_out_of_stock(&self) -> bool {
        self.quantity <= 0
    }
}

// ============================================================================
// Products
// ============================================================================

/// Minimal catalog surface the core needs: existence checks and line pricing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    /// Product id
    pub id: ProductId,
    /// Stock keeping unit, unique per product
    pub sku: String,
    /// Display name
    pub name: String,
    /// Unit price in minor currency units
    pub unit_price_cents: i64,
}

// ============================================================================
// Cart
// ============================================================================

/// Who a cart belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum CartOwner {
    /// Anonymous cart identified by an opaque token
    Guest {
        /// Token handed to the browser
        token: CartToken,
    },
    /// Cart bound to an authenticated user
    User {
        /// Owning user
        user_id: UserId,
    },
}

/// One line of a cart.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    /// Line id
    pub id: CartLineId,
    /// Product backing the line
    pub product_id: ProductId,
    /// SKU at the time the line was added
    pub sku: String,
    /// Requested quantity, in `[1, MAX_LINE_QUANTITY]`
    pub quantity: u32,
    /// Unit price in minor units, snapshotted when the line was added
    pub unit_price_cents: i64,
}

impl CartLine {
    /// Line subtotal in minor units.
    #[must_use]
    pub const fn subtotal_cents(&self) -> i64 {
        self.unit_price_cents * self.quantity as i64
    }
}

/// A mutable pre-checkout collection of line items.
///
/// Carts carry no stock commitment: only checkout sessions place holds. Carts
/// never expire on their own.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    /// Cart id
    pub id: CartId,
    /// Guest token or owning user
    pub owner: CartOwner,
    /// ISO 4217 currency code for all lines
    pub currency: String,
    /// Line items
    pub lines: Vec<CartLine>,
}

impl Cart {
    /// Sum of all line subtotals in minor units.
    #[must_use]
    pub fn total_cents(&self) -> i64 {
        self.lines.iter().map(CartLine::subtotal_cents).sum()
    }

    /// Find a line by SKU.
    #[must_use]
    pub fn line_for_sku(&self, sku: &str) -> Option<&CartLine> {
        self.lines.iter().find(|line| line.sku == sku)
    }
}

// ============================================================================
// Checkout session
// ============================================================================

/// Lifecycle state of a checkout session.
///
/// `Active` is the only non-terminal state; leaving it releases the session's
/// stock holds exactly once.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Holding stock, waiting for order placement
    Active,
    /// Order placed (driven by order placement outside this core)
    Completed,
    /// Timed out and swept
    Expired,
    /// Cancelled by the user
    Cancelled,
}

impl SessionStatus {
    /// Stable wire/database representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Expired => "expired",
            Self::Cancelled => "cancelled",
        }
    }

    /// Parse the wire representation.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "active" => Some(Self::Active),
            "completed" => Some(Self::Completed),
            "expired" => Some(Self::Expired),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Terminal states admit no further transitions.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Active)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Postal address captured on a checkout session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    /// Recipient name
    pub name: String,
    /// Street address, first line
    pub line1: String,
    /// Street address, second line
    pub line2: Option<String>,
    /// City
    pub city: String,
    /// State / province / region
    pub region: String,
    /// Postal code
    pub postal_code: String,
    /// ISO 3166-1 alpha-2 country code
    pub country: String,
}

/// Shipping method chosen at checkout.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShippingMethod {
    /// Ground shipping
    Standard,
    /// Expedited shipping
    Express,
    /// Palletized freight for bulk supply orders
    Freight,
}

impl ShippingMethod {
    /// Stable wire/database representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Express => "express",
            Self::Freight => "freight",
        }
    }

    /// Parse the wire representation.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "standard" => Some(Self::Standard),
            "express" => Some(Self::Express),
            "freight" => Some(Self::Freight),
            _ => None,
        }
    }
}

impl fmt::Display for ShippingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One snapshotted line of a checkout session.
///
/// Copied from the cart when the session is created so the session releases
/// exactly what it held even if the cart mutates afterwards.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionItem {
    /// Product held against
    pub product_id: ProductId,
    /// SKU at snapshot time
    pub sku: String,
    /// Held quantity
    pub quantity: u32,
}

/// A time-bounded reservation snapshotting a cart's contents.
///
/// While `status` is [`SessionStatus::Active`], every item has a matching
/// outstanding `order_hold` ledger entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSession {
    /// Session id
    pub id: SessionId,
    /// Source cart
    pub cart_id: CartId,
    /// Lifecycle state
    pub status: SessionStatus,
    /// Where the order ships
    pub shipping_address: Address,
    /// Billing address
    pub billing_address: Address,
    /// Chosen shipping method
    pub shipping_method: ShippingMethod,
    /// Snapshotted line items
    pub items: Vec<SessionItem>,
    /// When the session was created
    pub created_at: DateTime<Utc>,
    /// When the session becomes eligible for the expiry sweep
    pub expires_at: DateTime<Utc>,
}
