//! The rollup catalog: a read-only registry of the fixed set of
//! pre-aggregated cubes. Each descriptor is plain data — the router (in
//! `rollup-query`) stays a small pattern matcher over this table rather than
//! growing cube-specific branches.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A dimension a cube can be keyed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Ord, PartialOrd)]
pub enum Column {
  Day,
  Hour,
  Minute,
  Week,
  Country,
  AdvertiserId,
  PublisherId,
  Type,
}

impl Column {
  pub const ALL: [Column; 8] = [
    Column::Day,
    Column::Hour,
    Column::Minute,
    Column::Week,
    Column::Country,
    Column::AdvertiserId,
    Column::PublisherId,
    Column::Type,
  ];

  pub fn as_str(&self) -> &'static str {
    match self {
      Column::Day => "day",
      Column::Hour => "hour",
      Column::Minute => "minute",
      Column::Week => "week",
      Column::Country => "country",
      Column::AdvertiserId => "advertiser_id",
      Column::PublisherId => "publisher_id",
      Column::Type => "type",
    }
  }

  pub fn parse(s: &str) -> Option<Self> {
    Column::ALL.into_iter().find(|c| c.as_str() == s)
  }

  /// Whether this column's raw values (i.e. not aggregate outputs) can
  /// legally be compared with arithmetic operators (`gt`, `lt`, ...). Every
  /// key column is an ordered string/int dimension and is fine under
  /// `between`/`gt`/etc; it's the two *aggregated* columns (`bid_price`,
  /// `total_price`) that are barred from rollup service under those
  /// operators.
  pub fn is_key_column(&self) -> bool {
    true
  }
}

impl fmt::Display for Column {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

/// Rough size class used by the Rollup Loader to choose eager vs. lazy
/// residency. The boundary is an expected row count of 100,000.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SizeClass {
  Small,
  Large,
}

/// One cube's immutable descriptor: its key columns (declaration order
/// matters for the on-disk schema), its file name, and its size class.
#[derive(Debug, Clone)]
pub struct RollupDescriptor {
  pub id: &'static str,
  pub key_columns: &'static [Column],
  pub size_class: SizeClass,
  pub file_name: &'static str,
}

impl RollupDescriptor {
  /// Expected row count is a purely declarative property of the descriptor
  /// (used to pick the smallest matching cube in the router); it is not
  /// measured against the real built cube.
  pub fn expected_row_count(&self) -> u64 {
    // Matches the size-class boundary of 100,000 rows; the exact constant
    // only matters relative to other descriptors' values.
    match self.size_class {
      SizeClass::Small => self.small_weight(),
      SizeClass::Large => 5_000_000,
    }
  }

  fn small_weight(&self) -> u64 {
    // Smaller key sets rank as smaller cubes among themselves so router ties
    // prefer narrower cubes before falling back to declaration order.
    100 * (self.key_columns.len() as u64) + 1
  }
}

macro_rules! cube {
  ($id:expr, [$($col:expr),+ $(,)?], $size:expr, $file:expr) => {
    RollupDescriptor { id: $id, key_columns: &[$($col),+], size_class: $size, file_name: $file }
  };
}

/// The closed set of rollups this implementation conforms with: the seven
/// single-dimension cubes paired with `type`, the three composite cubes, and
/// the one wide cube.
pub static CATALOG: &[RollupDescriptor] = &[
  cube!("day_type", [Column::Day, Column::Type], SizeClass::Small, "day_type.arrow"),
  cube!("hour_type", [Column::Hour, Column::Type], SizeClass::Small, "hour_type.arrow"),
  cube!("minute_type", [Column::Minute, Column::Type], SizeClass::Large, "minute_type.arrow"),
  cube!("week_type", [Column::Week, Column::Type], SizeClass::Small, "week_type.arrow"),
  cube!("country_type", [Column::Country, Column::Type], SizeClass::Small, "country_type.arrow"),
  cube!(
    "advertiser_type",
    [Column::AdvertiserId, Column::Type],
    SizeClass::Small,
    "advertiser_type.arrow"
  ),
  cube!(
    "publisher_type",
    [Column::PublisherId, Column::Type],
    SizeClass::Small,
    "publisher_type.arrow"
  ),
  cube!(
    "day_country_type",
    [Column::Day, Column::Country, Column::Type],
    SizeClass::Small,
    "day_country_type.arrow"
  ),
  cube!(
    "day_advertiser_type",
    [Column::Day, Column::AdvertiserId, Column::Type],
    SizeClass::Large,
    "day_advertiser_type.arrow"
  ),
  cube!(
    "hour_country_type",
    [Column::Hour, Column::Country, Column::Type],
    SizeClass::Small,
    "hour_country_type.arrow"
  ),
  cube!(
    "day_publisher_country_type",
    [Column::Day, Column::PublisherId, Column::Country, Column::Type],
    SizeClass::Large,
    "day_publisher_country_type.arrow"
  ),
];

/// Look up a descriptor by its catalog id.
pub fn find(id: &str) -> Option<&'static RollupDescriptor> {
  CATALOG.iter().find(|d| d.id == id)
}
