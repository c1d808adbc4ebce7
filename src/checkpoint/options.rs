//! Run configuration snapshot stored as the checkpoint header
//!
//! The header records the invocation parameters of the run that created the
//! checkpoint. It is written exactly once, when the file is created, and is
//! read back on resume to recover or validate the original invocation.
//!
//! Field order below is the on-disk order.

use std::io::{self, Read, Write};

use serde::Serialize;

use crate::codec::{decode_tag, encode_tag, invalid_data, Codec};

/// Character set of the input alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    #[default]
    Nucleotide,
    AminoAcid,
}

impl Codec for DataType {
    fn encode<W: Write + ?Sized>(&self, writer: &mut W) -> io::Result<usize> {
        let tag = match self {
            DataType::Nucleotide => 0,
            DataType::AminoAcid => 1,
        };
        encode_tag(writer, tag)
    }

    fn decode<R: Read + ?Sized>(reader: &mut R) -> io::Result<(Self, usize)> {
        let (tag, n) = decode_tag(reader)?;
        let value = match tag {
            0 => DataType::Nucleotide,
            1 => DataType::AminoAcid,
            other => return Err(invalid_data(format!("Unknown data type tag: {}", other))),
        };
        Ok((value, n))
    }
}

/// How discrete rate category values are summarised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RateCategoryType {
    #[default]
    Mean,
    Median,
}

impl Codec for RateCategoryType {
    fn encode<W: Write + ?Sized>(&self, writer: &mut W) -> io::Result<usize> {
        let tag = match self {
            RateCategoryType::Mean => 0,
            RateCategoryType::Median => 1,
        };
        encode_tag(writer, tag)
    }

    fn decode<R: Read + ?Sized>(reader: &mut R) -> io::Result<(Self, usize)> {
        let (tag, n) = decode_tag(reader)?;
        let value = match tag {
            0 => RateCategoryType::Mean,
            1 => RateCategoryType::Median,
            other => {
                return Err(invalid_data(format!(
                    "Unknown rate category type tag: {}",
                    other
                )))
            }
        };
        Ok((value, n))
    }
}

/// Invocation parameters of a checkpointed run.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct RunOptions {
    pub msa_filename: String,
    pub tree_filename: String,
    pub prefix: String,
    pub model_filename: String,
    pub freqs_filename: String,
    pub partition_filename: String,
    pub data_type: DataType,
    pub model_string: String,
    pub rate_cats: u64,
    pub rate_category_type: RateCategoryType,
    pub seed: u64,
    pub min_roots: u64,
    pub threads: u64,
    pub root_ratio: f64,
    pub abs_tolerance: f64,
    pub factor: f64,
    pub br_tolerance: f64,
    pub bfgs_tol: f64,
    pub silent: bool,
    pub exhaustive: bool,
    pub echo: bool,
    pub invariant_sites: bool,
    pub early_stop: bool,
}

impl Codec for RunOptions {
    fn encode<W: Write + ?Sized>(&self, writer: &mut W) -> io::Result<usize> {
        let mut total = 0;
        total += self.msa_filename.encode(writer)?;
        total += self.tree_filename.encode(writer)?;
        total += self.prefix.encode(writer)?;
        total += self.model_filename.encode(writer)?;
        total += self.freqs_filename.encode(writer)?;
        total += self.partition_filename.encode(writer)?;
        total += self.data_type.encode(writer)?;
        total += self.model_string.encode(writer)?;
        total += self.rate_cats.encode(writer)?;
        total += self.rate_category_type.encode(writer)?;
        total += self.seed.encode(writer)?;
        total += self.min_roots.encode(writer)?;
        total += self.threads.encode(writer)?;
        total += self.root_ratio.encode(writer)?;
        total += self.abs_tolerance.encode(writer)?;
        total += self.factor.encode(writer)?;
        total += self.br_tolerance.encode(writer)?;
        total += self.bfgs_tol.encode(writer)?;
        total += self.silent.encode(writer)?;
        total += self.exhaustive.encode(writer)?;
        total += self.echo.encode(writer)?;
        total += self.invariant_sites.encode(writer)?;
        total += self.early_stop.encode(writer)?;
        Ok(total)
    }

    fn decode<R: Read + ?Sized>(reader: &mut R) -> io::Result<(Self, usize)> {
        let mut total = 0;

        macro_rules! next {
            ($ty:ty) => {{
                let (value, n) = <$ty>::decode(reader)?;
                total += n;
                value
            }};
        }

        let options = RunOptions {
            msa_filename: next!(String),
            tree_filename: next!(String),
            prefix: next!(String),
            model_filename: next!(String),
            freqs_filename: next!(String),
            partition_filename: next!(String),
            data_type: next!(DataType),
            model_string: next!(String),
            rate_cats: next!(u64),
            rate_category_type: next!(RateCategoryType),
            seed: next!(u64),
            min_roots: next!(u64),
            threads: next!(u64),
            root_ratio: next!(f64),
            abs_tolerance: next!(f64),
            factor: next!(f64),
            br_tolerance: next!(f64),
            bfgs_tol: next!(f64),
            silent: next!(bool),
            exhaustive: next!(bool),
            echo: next!(bool),
            invariant_sites: next!(bool),
            early_stop: next!(bool),
        };
        Ok((options, total))
    }
}
