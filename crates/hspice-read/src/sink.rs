//! Output sink for assembled tables

use crate::types::{Result, Table, VectorData};
use num_complex::Complex64;

/// Destination for decoded tables
///
/// The assembler allocates columns through the sink, fills them, inserts
/// them into a fresh mapping and appends the mapping to the sink's table
/// list. Hosts that surface results in their own object model implement
/// this trait; [`DocumentSink`] keeps everything in memory.
pub trait OutputSink {
    /// Host mapping type holding one table
    type Table;

    fn new_real_array(&mut self, len: usize) -> Result<Vec<f64>> {
        let mut column = Vec::new();
        column.try_reserve_exact(len)?;
        Ok(column)
    }

    fn new_complex_array(&mut self, len: usize) -> Result<Vec<Complex64>> {
        let mut column = Vec::new();
        column.try_reserve_exact(len)?;
        Ok(column)
    }

    fn new_mapping(&mut self, sweep_value: Option<f64>) -> Result<Self::Table>;

    fn insert(&mut self, table: &mut Self::Table, key: &str, column: VectorData) -> Result<()>;

    fn append_table(&mut self, table: Self::Table) -> Result<()>;
}

/// In-memory sink collecting [`Table`]s
#[derive(Debug, Default)]
pub struct DocumentSink {
    tables: Vec<Table>,
}

impl DocumentSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tables(&self) -> &[Table] {
        &self.tables
    }

    pub fn into_tables(self) -> Vec<Table> {
        self.tables
    }
}

impl OutputSink for DocumentSink {
    type Table = Table;

    fn new_mapping(&mut self, sweep_value: Option<f64>) -> Result<Table> {
        Ok(Table::new(sweep_value))
    }

    fn insert(&mut self, table: &mut Table, key: &str, column: VectorData) -> Result<()> {
        table.insert(key, column);
        Ok(())
    }

    fn append_table(&mut self, table: Table) -> Result<()> {
        self.tables.try_reserve(1)?;
        self.tables.push(table);
        Ok(())
    }
}
