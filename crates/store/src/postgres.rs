use async_trait::async_trait;
use blocks_types::{Block, Consumer, Lock, Transaction};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::error::StoreError;
use crate::traits::Store;

const INITIAL_DDL: &str = include_str!("../sql/initial.sql");

/// A `Store` backed by a PostgreSQL connection pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new().max_connections(10).connect(database_url).await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn map_unique_violation(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            let constraint = db_err.constraint().unwrap_or("unknown").to_string();
            return StoreError::UniqueViolation { constraint };
        }
    }
    StoreError::Database(err)
}

#[async_trait]
impl Store for PgStore {
    async fn run_initial_ddl(&self) -> Result<bool, StoreError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM information_schema.tables \
             WHERE table_schema = 'public' AND table_name = 'block')",
        )
        .fetch_one(&self.pool)
        .await?;

        if exists {
            return Ok(false);
        }

        sqlx::query(INITIAL_DDL)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Ddl(e.to_string()))?;

        Ok(true)
    }

    async fn get_latest_block_number(&self) -> Result<Option<u64>, StoreError> {
        let max: Option<i64> =
            sqlx::query_scalar("SELECT MAX(block_number) FROM block").fetch_one(&self.pool).await?;
        Ok(max.map(|v| v as u64))
    }

    async fn get_block_numbers_chunk(
        &self,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<(u64, bool)>, StoreError> {
        let rows = sqlx::query(
            "SELECT block_number, primed FROM block \
             ORDER BY block_number ASC OFFSET $1 LIMIT $2",
        )
        .bind(offset as i64)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let number: i64 = row.get("block_number");
                let primed: bool = row.get("primed");
                (number as u64, primed)
            })
            .collect())
    }

    async fn insert_block(&self, block: &Block) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO block \
             (block_number, block_timestamp, difficulty, hash, miner, gas_used, gas_limit, \
              nonce, size) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(block.block_number as i64)
        .bind(block.block_timestamp)
        .bind(block.difficulty.map(|v| v as i64))
        .bind(&block.hash)
        .bind(&block.miner)
        .bind(block.gas_used.map(|v| v as i64))
        .bind(block.gas_limit.map(|v| v as i64))
        .bind(block.nonce)
        .bind(block.size)
        .execute(&self.pool)
        .await
        .map_err(map_unique_violation)?;

        Ok(())
    }

    async fn insert_transaction_stub(
        &self,
        hash: &str,
        block_number: Option<u64>,
    ) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO transaction (hash, dirty, block_number) VALUES ($1, true, $2)")
            .bind(hash)
            .bind(block_number.map(|v| v as i64))
            .execute(&self.pool)
            .await
            .map_err(map_unique_violation)?;

        Ok(())
    }

    async fn mark_primed(&self, block_number: u64) -> Result<(), StoreError> {
        sqlx::query("UPDATE block SET primed = true WHERE block_number = $1")
            .bind(block_number as i64)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_unprimed_blocks(
        &self,
        limit: u32,
        exclude: &[u64],
    ) -> Result<Vec<u64>, StoreError> {
        let exclude: Vec<i64> = exclude.iter().map(|&v| v as i64).collect();
        let rows = sqlx::query(
            "SELECT block_number FROM block \
             WHERE primed = false AND NOT (block_number = ANY($1)) \
             ORDER BY block_number DESC LIMIT $2",
        )
        .bind(&exclude)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|row| row.get::<i64, _>("block_number") as u64).collect())
    }

    async fn validate_block(&self, block_number: u64) -> Result<(bool, Vec<String>), StoreError> {
        let row = sqlx::query(
            "SELECT block_timestamp, difficulty, hash, miner, gas_used, gas_limit, nonce, size \
             FROM block WHERE block_number = $1",
        )
        .bind(block_number as i64)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok((false, vec!["No block".to_string()]));
        };

        let block = Block {
            block_number,
            block_timestamp: row.get("block_timestamp"),
            difficulty: row.get::<Option<i64>, _>("difficulty").map(|v| v as u64),
            hash: row.get("hash"),
            miner: row.get("miner"),
            gas_used: row.get::<Option<i64>, _>("gas_used").map(|v| v as u64),
            gas_limit: row.get::<Option<i64>, _>("gas_limit").map(|v| v as u64),
            nonce: row.get("nonce"),
            size: row.get("size"),
            primed: false,
        };

        Ok(block.validate())
    }

    async fn validate_block_primed(
        &self,
        block_number: u64,
    ) -> Result<(bool, Vec<String>), StoreError> {
        let primed: Option<bool> =
            sqlx::query_scalar("SELECT primed FROM block WHERE block_number = $1")
                .bind(block_number as i64)
                .fetch_optional(&self.pool)
                .await?;

        match primed {
            None => Ok((false, vec!["No block".to_string()])),
            Some(true) => Ok((true, vec![])),
            Some(false) => Ok((false, vec!["Not marked primed".to_string()])),
        }
    }

    async fn count_blocks(&self) -> Result<i64, StoreError> {
        Ok(sqlx::query_scalar("SELECT COUNT(*) FROM block").fetch_one(&self.pool).await?)
    }

    async fn get_blocks_in_range(&self, start: u64, end: u64) -> Result<Vec<Block>, StoreError> {
        let rows = sqlx::query(
            "SELECT block_number, block_timestamp, difficulty, hash, miner, gas_used, \
             gas_limit, nonce, size, primed FROM block \
             WHERE block_number >= $1 AND block_number < $2 ORDER BY block_number ASC",
        )
        .bind(start as i64)
        .bind(end as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| Block {
                block_number: row.get::<i64, _>("block_number") as u64,
                block_timestamp: row.get("block_timestamp"),
                difficulty: row.get::<Option<i64>, _>("difficulty").map(|v| v as u64),
                hash: row.get("hash"),
                miner: row.get("miner"),
                gas_used: row.get::<Option<i64>, _>("gas_used").map(|v| v as u64),
                gas_limit: row.get::<Option<i64>, _>("gas_limit").map(|v| v as u64),
                nonce: row.get("nonce"),
                size: row.get("size"),
                primed: row.get("primed"),
            })
            .collect())
    }

    async fn get_random_dirty_transactions(&self, limit: u32) -> Result<Vec<String>, StoreError> {
        let rows = sqlx::query(
            "SELECT hash FROM transaction WHERE dirty = true ORDER BY random() LIMIT $1",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|row| row.get("hash")).collect())
    }

    async fn update_transaction_detail(&self, tx: &Transaction) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE transaction SET \
             dirty = false, block_number = $1, from_address = $2, to_address = $3, \
             value = $4::numeric, gas_price = $5::numeric, gas_limit = $6, nonce = $7, input = $8 \
             WHERE hash = $9",
        )
        .bind(tx.block_number)
        .bind(&tx.from_address)
        .bind(&tx.to_address)
        .bind(&tx.value)
        .bind(&tx.gas_price)
        .bind(tx.gas_limit)
        .bind(tx.nonce)
        .bind(&tx.input)
        .bind(&tx.hash)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn validate_transaction(&self, hash: &str) -> Result<(bool, Vec<String>), StoreError> {
        let row = sqlx::query(
            "SELECT hash, dirty, block_number, from_address, to_address, \
             value::text AS value, gas_price::text AS gas_price, gas_limit, nonce, input \
             FROM transaction WHERE hash = $1",
        )
        .bind(hash)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok((false, vec!["No transaction".to_string()]));
        };

        let tx = Transaction {
            hash: row.get("hash"),
            dirty: row.get("dirty"),
            block_number: row.get("block_number"),
            from_address: row.get("from_address"),
            to_address: row.get("to_address"),
            value: row.get("value"),
            gas_price: row.get("gas_price"),
            gas_limit: row.get("gas_limit"),
            nonce: row.get("nonce"),
            input: row.get("input"),
        };

        Ok(tx.validate())
    }

    async fn count_transactions(&self) -> Result<i64, StoreError> {
        Ok(sqlx::query_scalar("SELECT COUNT(*) FROM transaction").fetch_one(&self.pool).await?)
    }

    async fn register_consumer(&self, consumer: &Consumer) -> Result<(), StoreError> {
        // `ON CONFLICT DO NOTHING` makes this safe to call on every first
        // contact from a `uuid` the conductor's in-memory view hasn't seen
        // since its own last restart, even if the row already exists from
        // before that restart.
        sqlx::query(
            "INSERT INTO consumer (consumer_uuid, name, address, port, active, last_seen) \
             VALUES ($1, $2, $3, $4, $5, now()) \
             ON CONFLICT (consumer_uuid) DO NOTHING",
        )
        .bind(consumer.consumer_uuid)
        .bind(&consumer.name)
        .bind(&consumer.address)
        .bind(consumer.port)
        .bind(consumer.active)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn ping_consumer(&self, uuid: Uuid) -> Result<(), StoreError> {
        sqlx::query("UPDATE consumer SET last_seen = now() WHERE consumer_uuid = $1")
            .bind(uuid)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn deactivate_consumer(&self, uuid: Uuid) -> Result<(), StoreError> {
        sqlx::query("UPDATE consumer SET active = false WHERE consumer_uuid = $1")
            .bind(uuid)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn live_lock_for_pid(&self, pid: i32) -> Result<Option<Lock>, StoreError> {
        let row = sqlx::query(
            "SELECT lock_id, name, pid, updated FROM lock \
             WHERE pid = $1 AND updated + interval '1 hour' > now() \
             LIMIT 1",
        )
        .bind(pid)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| Lock {
            lock_id: row.get("lock_id"),
            name: row.get("name"),
            pid: row.get("pid"),
            updated: row.get("updated"),
        }))
    }

    async fn live_locks_for_name(&self, name: &str) -> Result<Vec<Lock>, StoreError> {
        let rows = sqlx::query(
            "SELECT lock_id, name, pid, updated FROM lock \
             WHERE name = $1 AND updated + interval '1 hour' > now()",
        )
        .bind(name)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| Lock {
                lock_id: row.get("lock_id"),
                name: row.get("name"),
                pid: row.get("pid"),
                updated: row.get("updated"),
            })
            .collect())
    }

    async fn insert_lock(&self, name: &str, pid: i32) -> Result<i64, StoreError> {
        let lock_id: i64 = sqlx::query_scalar(
            "INSERT INTO lock (name, pid, updated) VALUES ($1, $2, now()) RETURNING lock_id",
        )
        .bind(name)
        .bind(pid)
        .fetch_one(&self.pool)
        .await?;

        Ok(lock_id)
    }

    async fn renew_lock(&self, lock_id: i64) -> Result<(), StoreError> {
        sqlx::query("UPDATE lock SET updated = now() WHERE lock_id = $1")
            .bind(lock_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_lock(&self, name: &str, pid: i32) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM lock WHERE name = $1 AND pid = $2")
            .bind(name)
            .bind(pid)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
