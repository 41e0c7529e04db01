//! `reqwest` client for the spreadsheet service's row/cell API. Only the
//! row/column contract matters here; the service's own storage format is
//! its business.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use super::{LedgerTables, StoreError, Table};

pub struct HttpSheets {
    client: reqwest::Client,
    base_url: Url,
    api_token: String,
}

#[derive(Debug, Deserialize)]
struct CellValue {
    value: String,
}

#[derive(Debug, Deserialize)]
struct ColumnValues {
    values: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct TableRows {
    rows: Vec<Vec<String>>,
}

#[derive(Debug, Serialize)]
struct WriteCell<'a> {
    row: u32,
    col: u32,
    value: &'a str,
}

#[derive(Debug, Serialize)]
struct DeleteRows {
    from: u32,
    count: u32,
}

impl HttpSheets {
    pub fn new(base_url: &str, api_token: &str) -> Result<Self, StoreError> {
        let base_url = Url::parse(base_url)
            .map_err(|err| StoreError::InvalidData(format!("invalid ledger base url: {err}")))?;

        Ok(Self {
            client: reqwest::Client::new(),
            base_url,
            api_token: api_token.to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, StoreError> {
        self.base_url
            .join(path)
            .map_err(|err| StoreError::InvalidData(format!("invalid ledger endpoint: {err}")))
    }

    fn table_endpoint(&self, table: Table, resource: &str) -> Result<Url, StoreError> {
        self.endpoint(&format!("tables/{}/{resource}", table.name()))
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, StoreError> {
        let response = request
            .bearer_auth(&self.api_token)
            .send()
            .await
            .map_err(|err| StoreError::Unavailable(err.to_string()))?;

        if !response.status().is_success() {
            return Err(StoreError::Unavailable(format!(
                "ledger store answered {}",
                response.status()
            )));
        }
        Ok(response)
    }
}

#[async_trait]
impl LedgerTables for HttpSheets {
    async fn ping(&self) -> Result<(), StoreError> {
        let url = self.endpoint("healthz")?;
        self.send(self.client.get(url)).await?;
        Ok(())
    }

    async fn read_cell(&self, table: Table, row: u32, col: u32) -> Result<String, StoreError> {
        let url = self.table_endpoint(table, "cell")?;
        let response = self
            .send(self.client.get(url).query(&[("row", row), ("col", col)]))
            .await?;
        let cell: CellValue = response
            .json()
            .await
            .map_err(|err| StoreError::InvalidData(err.to_string()))?;
        Ok(cell.value)
    }

    async fn write_cell(
        &self,
        table: Table,
        row: u32,
        col: u32,
        value: &str,
    ) -> Result<(), StoreError> {
        let url = self.table_endpoint(table, "cell")?;
        self.send(self.client.put(url).json(&WriteCell { row, col, value }))
            .await?;
        Ok(())
    }

    async fn read_column(
        &self,
        table: Table,
        col: u32,
        from_row: u32,
        to_row: u32,
    ) -> Result<Vec<String>, StoreError> {
        let url = self.table_endpoint(table, "column")?;
        let response = self
            .send(
                self.client
                    .get(url)
                    .query(&[("col", col), ("from", from_row), ("to", to_row)]),
            )
            .await?;
        let column: ColumnValues = response
            .json()
            .await
            .map_err(|err| StoreError::InvalidData(err.to_string()))?;
        Ok(column.values)
    }

    async fn read_all_rows(&self, table: Table) -> Result<Vec<Vec<String>>, StoreError> {
        let url = self.table_endpoint(table, "rows")?;
        let response = self.send(self.client.get(url)).await?;
        let payload: TableRows = response
            .json()
            .await
            .map_err(|err| StoreError::InvalidData(err.to_string()))?;
        Ok(payload.rows)
    }

    async fn append_row(&self, table: Table, row: &[String]) -> Result<(), StoreError> {
        self.append_rows(table, &[row.to_vec()]).await
    }

    async fn append_rows(&self, table: Table, rows: &[Vec<String>]) -> Result<(), StoreError> {
        let url = self.table_endpoint(table, "rows")?;
        self.send(self.client.post(url).json(&TableRows {
            rows: rows.to_vec(),
        }))
        .await?;
        Ok(())
    }

    async fn delete_rows(
        &self,
        table: Table,
        from_row: u32,
        count: u32,
    ) -> Result<(), StoreError> {
        let url = self.table_endpoint(table, "rows")?;
        self.send(self.client.delete(url).json(&DeleteRows {
            from: from_row,
            count,
        }))
        .await?;
        Ok(())
    }
}
