// Entity tables and their queries.
//
// Balance-sheet and budget items are valued by dated snapshots; the flat
// legacy tables hold a single amount per row.

pub mod balance_sheet;
pub mod budget;
pub mod legacy;
pub mod values;

pub use balance_sheet::{
    BalanceSheetItem, BalanceSheetItemWithValue, BalanceSheetType, BalanceSheetValue,
    NewBalanceSheetItem,
};
pub use budget::{
    BudgetItem, BudgetItemWithValue, BudgetSummary, BudgetType, BudgetValue, NewBudgetItem,
};
pub use legacy::{AssetEntity, LiabilityEntity};
pub use values::ValueSnapshot;
