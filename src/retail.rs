use anyhow::Context;
use serde_derive::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io;
use std::path::Path;

use implicit::{IdIndex, InteractionMatrix};

/// One line of an online retail transactions export. Other columns are ignored.
#[derive(Debug, Deserialize)]
struct Transaction {
    #[serde(rename = "StockCode")]
    stock_code: String,
    #[serde(rename = "Description", default)]
    description: Option<String>,
    #[serde(rename = "Quantity")]
    quantity: i64,
    #[serde(rename = "CustomerID", default)]
    customer_id: Option<String>,
}

/// Purchases by customer and product, ready to be factorized.
#[derive(Debug, Clone)]
pub struct RetailData {
    /// Customers x products, summed quantities.
    pub interactions: InteractionMatrix,
    /// Matrix rows, by ascending customer id.
    pub customers: IdIndex<u64>,
    /// Matrix columns.
    pub products: IdIndex<String>,
    /// Stock code to product description.
    pub descriptions: HashMap<String, String>,
}

impl RetailData {
    /// Percentage of customer x product pairs without a purchase.
    pub fn sparsity(&self) -> f64 {
        self.interactions.sparsity()
    }
}

/// Exports store customer ids as floats (`17850.0`) whenever a column has missing values.
fn parse_customer_id(raw: &str) -> anyhow::Result<u64> {
    if let Ok(id) = raw.parse::<u64>() {
        return Ok(id);
    }

    let id = raw
        .parse::<f64>()
        .with_context(|| format!("invalid customer id {raw:?}"))?;
    anyhow::ensure!(
        id >= 0.0 && id.fract() == 0.0 && id <= u64::MAX as f64,
        "customer id {raw:?} is not a non-negative integer"
    );

    Ok(id as u64)
}

/// Reads transactions from CSV with a header row.
///
/// Lines without a customer are dropped. Quantities are summed by customer and product, and
/// any total that is not positive (returns outweighing purchases) counts as a single purchase.
/// Products are numbered in order of first appearance when walking customers by ascending id.
pub fn read_transactions<R: io::Read>(reader: R) -> anyhow::Result<RetailData> {
    let mut reader = csv::Reader::from_reader(reader);

    let mut quantities = BTreeMap::<(u64, String), i64>::new();
    let mut descriptions = HashMap::<String, String>::new();
    let mut dropped = 0usize;

    for (line, result) in reader.deserialize::<Transaction>().enumerate() {
        // Line 1 is the header.
        let transaction =
            result.with_context(|| format!("malformed transaction at line {}", line + 2))?;

        if let Some(description) = transaction.description.as_deref().map(str::trim) {
            if !description.is_empty() {
                descriptions
                    .entry(transaction.stock_code.clone())
                    .or_insert_with(|| description.to_owned());
            }
        }

        let Some(customer_id) = transaction
            .customer_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
        else {
            dropped += 1;
            continue;
        };
        let customer_id = parse_customer_id(customer_id)
            .with_context(|| format!("at line {}", line + 2))?;

        *quantities
            .entry((customer_id, transaction.stock_code))
            .or_default() += transaction.quantity;
    }

    if dropped > 0 {
        tracing::debug!(dropped, "dropped transactions without a customer");
    }

    let mut customers = IdIndex::new();
    let mut products = IdIndex::new();
    let triplets = quantities
        .into_iter()
        .map(|((customer_id, stock_code), quantity)| {
            (
                customers.insert(customer_id),
                products.insert(stock_code),
                if quantity > 0 { quantity as f64 } else { 1.0 },
            )
        })
        .collect::<Vec<_>>();

    let interactions = InteractionMatrix::from_triplets(customers.len(), products.len(), triplets)
        .context("could not build the interaction matrix")?;

    tracing::info!(
        customers = customers.len(),
        products = products.len(),
        interactions = interactions.nnz(),
        "loaded transactions"
    );

    Ok(RetailData {
        interactions,
        customers,
        products,
        descriptions,
    })
}

/// Reads a transactions CSV file. See [`read_transactions`].
pub fn load(path: &Path) -> anyhow::Result<RetailData> {
    let file = File::open(path).with_context(|| format!("could not open {}", path.display()))?;
    read_transactions(io::BufReader::new(file))
        .with_context(|| format!("could not read transactions from {}", path.display()))
}

#[cfg(test)]
mod test {
    use super::*;

    const TRANSACTIONS: &str = "\
InvoiceNo,StockCode,Description,Quantity,InvoiceDate,UnitPrice,CustomerID,Country
536365,85123A,WHITE HANGING HEART T-LIGHT HOLDER,6,12/1/2010 8:26,2.55,17850.0,United Kingdom
536365,71053,WHITE METAL LANTERN,6,12/1/2010 8:26,3.39,17850.0,United Kingdom
536366,22633,HAND WARMER UNION JACK,6,12/1/2010 8:28,1.85,13047.0,United Kingdom
536367,85123A,,4,12/1/2010 8:34,2.55,13047.0,United Kingdom
C536379,22633,HAND WARMER UNION JACK,-6,12/1/2010 9:41,1.85,13047.0,United Kingdom
536368,71053,,2,12/1/2010 8:34,3.39,,United Kingdom
536370,85123A,WHITE HANGING HEART,12,12/1/2010 8:45,2.55,17850,United Kingdom
536371,84029G,KNITTED UNION FLAG HOT WATER BOTTLE,-3,12/1/2010 9:00,3.39,12583.0,France
";

    #[test]
    fn test_aggregation() {
        let data = read_transactions(TRANSACTIONS.as_bytes()).unwrap();

        assert_eq!(
            data.customers.iter().copied().collect::<Vec<_>>(),
            [12583, 13047, 17850]
        );
        // Visiting (customer, stock code) in order.
        assert_eq!(
            data.products.iter().map(String::as_str).collect::<Vec<_>>(),
            ["84029G", "22633", "85123A", "71053"]
        );
        assert_eq!(data.interactions.shape(), (3, 4));
        assert_eq!(data.interactions.nnz(), 5);

        let quantity = |customer: u64, code: &str| {
            data.interactions.get(
                data.customers.position(&customer).unwrap(),
                data.products.position(code).unwrap(),
            )
        };
        assert_eq!(quantity(17850, "85123A"), 18.0);
        assert_eq!(quantity(17850, "71053"), 6.0);
        assert_eq!(quantity(13047, "85123A"), 4.0);
        // Returns cancel the purchase: still counts as an interaction.
        assert_eq!(quantity(13047, "22633"), 1.0);
        assert_eq!(quantity(12583, "84029G"), 1.0);
        assert_eq!(quantity(12583, "22633"), 0.0);
    }

    #[test]
    fn test_descriptions_keep_the_first_one() {
        let data = read_transactions(TRANSACTIONS.as_bytes()).unwrap();

        assert_eq!(data.descriptions.len(), 4);
        assert_eq!(
            data.descriptions["85123A"],
            "WHITE HANGING HEART T-LIGHT HOLDER"
        );
        assert_eq!(data.descriptions["71053"], "WHITE METAL LANTERN");
    }

    #[test]
    fn test_sparsity() {
        let data = read_transactions(TRANSACTIONS.as_bytes()).unwrap();
        approx::assert_relative_eq!(data.sparsity(), 100.0 * (1.0 - 5.0 / 12.0));
    }

    #[test]
    fn test_malformed_input() {
        let bad_quantity = "StockCode,Description,Quantity,CustomerID\n85123A,HEART,many,17850\n";
        assert!(read_transactions(bad_quantity.as_bytes()).is_err());

        let bad_customer = "StockCode,Description,Quantity,CustomerID\n85123A,HEART,1,17850.5\n";
        assert!(read_transactions(bad_customer.as_bytes()).is_err());

        let empty = "StockCode,Description,Quantity,CustomerID\n";
        let data = read_transactions(empty.as_bytes()).unwrap();
        assert!(data.customers.is_empty());
        assert!(data.interactions.is_empty());
    }

    #[test]
    fn test_customer_ids() {
        assert_eq!(parse_customer_id("17850").unwrap(), 17850);
        assert_eq!(parse_customer_id("17850.0").unwrap(), 17850);
        assert!(parse_customer_id("-1").is_err());
        assert!(parse_customer_id("abc").is_err());
    }
}
