pub mod bits;
pub mod bounded;
pub mod section;
pub mod pat;
pub mod pmt;
pub mod tdt;
pub mod tot;

pub use bounded::BoundedList;
pub use section::sections;
pub use pat::{parse_pat_table, PatHeader, PatServiceInfo, PatTable};
pub use pmt::{parse_pmt_table, PmtElementaryInfo, PmtTable, PmtTableHeader};
pub use tdt::{parse_tdt_table, TdtTable};
pub use tot::{parse_tot_table, LocalTimeOffsetDescriptor, LtoDescriptorInfo, OffsetPolarity, TotTable};
