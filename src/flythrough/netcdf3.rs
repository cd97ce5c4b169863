//! Minimal NetCDF classic (CDF-1) encoder/decoder for flythrough
//! results: one fixed `time` dimension, f64 variables with a `units`
//! attribute, and string global attributes. Big-endian throughout, per
//! the classic format. Record variables, fill values, and the 64-bit
//! offset variant are not supported.

use std::fs;
use std::path::Path;

use thiserror::Error;

const MAGIC: &[u8; 3] = b"CDF";
const VERSION_CLASSIC: u8 = 1;

const NC_DIMENSION: u32 = 0x0A;
const NC_VARIABLE: u32 = 0x0B;
const NC_ATTRIBUTE: u32 = 0x0C;
const NC_CHAR: u32 = 2;
const NC_DOUBLE: u32 = 6;

#[derive(Debug, Error)]
pub enum NcError {
    #[error("NetCDF io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("not a NetCDF classic file")]
    BadMagic,
    #[error("malformed NetCDF file: {0}")]
    Malformed(String),
    #[error("unsupported NetCDF feature: {0}")]
    Unsupported(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct NcVar {
    pub name: String,
    pub units: String,
    pub data: Vec<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NcFile {
    pub global_attrs: Vec<(String, String)>,
    pub vars: Vec<NcVar>,
}

impl NcFile {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.global_attrs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

pub fn write(path: &Path, file: &NcFile) -> Result<(), NcError> {
    let len = file.vars.first().map(|v| v.data.len()).unwrap_or(0);
    if file.vars.iter().any(|v| v.data.len() != len) {
        return Err(NcError::Malformed(
            "variables have unequal lengths".to_string(),
        ));
    }

    // Two passes: measure the header with zero offsets, then lay the
    // variable data out contiguously behind it.
    let header_len = build_header(file, len, &vec![0; file.vars.len()]).len();
    let mut begins = Vec::with_capacity(file.vars.len());
    let mut offset = header_len;
    for var in &file.vars {
        begins.push(offset as u32);
        offset += var.data.len() * 8;
    }

    let mut bytes = build_header(file, len, &begins);
    for var in &file.vars {
        for value in &var.data {
            bytes.extend_from_slice(&value.to_be_bytes());
        }
    }
    fs::write(path, bytes)?;
    Ok(())
}

fn put_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_be_bytes());
}

fn put_name(out: &mut Vec<u8>, name: &str) {
    put_u32(out, name.len() as u32);
    out.extend_from_slice(name.as_bytes());
    out.resize(out.len().div_ceil(4) * 4, 0);
}

fn put_attr(out: &mut Vec<u8>, name: &str, value: &str) {
    put_name(out, name);
    put_u32(out, NC_CHAR);
    put_u32(out, value.len() as u32);
    out.extend_from_slice(value.as_bytes());
    out.resize(out.len().div_ceil(4) * 4, 0);
}

fn put_absent(out: &mut Vec<u8>) {
    put_u32(out, 0);
    put_u32(out, 0);
}

fn build_header(file: &NcFile, dim_len: usize, begins: &[u32]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(MAGIC);
    out.push(VERSION_CLASSIC);
    put_u32(&mut out, 0); // numrecs: no record variables

    // dim_list: the single fixed "time" dimension
    put_u32(&mut out, NC_DIMENSION);
    put_u32(&mut out, 1);
    put_name(&mut out, "time");
    put_u32(&mut out, dim_len as u32);

    // gatt_list
    if file.global_attrs.is_empty() {
        put_absent(&mut out);
    } else {
        put_u32(&mut out, NC_ATTRIBUTE);
        put_u32(&mut out, file.global_attrs.len() as u32);
        for (name, value) in &file.global_attrs {
            put_attr(&mut out, name, value);
        }
    }

    // var_list
    if file.vars.is_empty() {
        put_absent(&mut out);
    } else {
        put_u32(&mut out, NC_VARIABLE);
        put_u32(&mut out, file.vars.len() as u32);
        for (var, begin) in file.vars.iter().zip(begins) {
            put_name(&mut out, &var.name);
            put_u32(&mut out, 1); // ndims
            put_u32(&mut out, 0); // dimid of "time"
            put_u32(&mut out, NC_ATTRIBUTE);
            put_u32(&mut out, 1);
            put_attr(&mut out, "units", &var.units);
            put_u32(&mut out, NC_DOUBLE);
            put_u32(&mut out, (var.data.len() * 8) as u32);
            put_u32(&mut out, *begin);
        }
    }
    out
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], NcError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&e| e <= self.bytes.len())
            .ok_or_else(|| NcError::Malformed("truncated file".to_string()))?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u32(&mut self) -> Result<u32, NcError> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn padded(&mut self, n: usize) -> Result<&'a [u8], NcError> {
        let data = self.take(n)?;
        self.take(n.div_ceil(4) * 4 - n)?;
        Ok(data)
    }

    fn name(&mut self) -> Result<String, NcError> {
        let n = self.u32()? as usize;
        let bytes = self.padded(n)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| NcError::Malformed("non-UTF8 name".to_string()))
    }
}

fn read_attrs(cur: &mut Cursor<'_>) -> Result<Vec<(String, String)>, NcError> {
    let tag = cur.u32()?;
    let count = cur.u32()? as usize;
    if tag == 0 && count == 0 {
        return Ok(Vec::new());
    }
    if tag != NC_ATTRIBUTE {
        return Err(NcError::Malformed(format!("expected attribute list, got tag {tag}")));
    }
    let mut attrs = Vec::with_capacity(count);
    for _ in 0..count {
        let name = cur.name()?;
        let nc_type = cur.u32()?;
        let nelems = cur.u32()? as usize;
        if nc_type != NC_CHAR {
            return Err(NcError::Unsupported(format!(
                "attribute '{name}' has type {nc_type}, only char attributes are read"
            )));
        }
        let value = String::from_utf8(cur.padded(nelems)?.to_vec())
            .map_err(|_| NcError::Malformed(format!("attribute '{name}' is not UTF8")))?;
        attrs.push((name, value));
    }
    Ok(attrs)
}

pub fn read(path: &Path) -> Result<NcFile, NcError> {
    let bytes = fs::read(path)?;
    let mut cur = Cursor {
        bytes: &bytes,
        pos: 0,
    };

    if cur.take(3)? != MAGIC {
        return Err(NcError::BadMagic);
    }
    match cur.take(1)?[0] {
        VERSION_CLASSIC => {}
        2 => return Err(NcError::Unsupported("64-bit offset format".to_string())),
        _ => return Err(NcError::BadMagic),
    }
    let _numrecs = cur.u32()?;

    // dim_list
    let tag = cur.u32()?;
    let dim_count = cur.u32()? as usize;
    let mut dim_lens = Vec::new();
    if tag == NC_DIMENSION {
        for _ in 0..dim_count {
            let _name = cur.name()?;
            dim_lens.push(cur.u32()? as usize);
        }
    } else if !(tag == 0 && dim_count == 0) {
        return Err(NcError::Malformed(format!("expected dimension list, got tag {tag}")));
    }

    let global_attrs = read_attrs(&mut cur)?;

    let tag = cur.u32()?;
    let var_count = cur.u32()? as usize;
    let mut vars = Vec::new();
    if tag == NC_VARIABLE {
        for _ in 0..var_count {
            let name = cur.name()?;
            let ndims = cur.u32()? as usize;
            if ndims != 1 {
                return Err(NcError::Unsupported(format!(
                    "variable '{name}' has {ndims} dimensions"
                )));
            }
            let dimid = cur.u32()? as usize;
            let len = *dim_lens
                .get(dimid)
                .ok_or_else(|| NcError::Malformed(format!("variable '{name}' has bad dimid {dimid}")))?;
            let attrs = read_attrs(&mut cur)?;
            let units = attrs
                .into_iter()
                .find(|(n, _)| n == "units")
                .map(|(_, v)| v)
                .unwrap_or_default();
            let nc_type = cur.u32()?;
            if nc_type != NC_DOUBLE {
                return Err(NcError::Unsupported(format!(
                    "variable '{name}' has type {nc_type}, only doubles are read"
                )));
            }
            let _vsize = cur.u32()?;
            let begin = cur.u32()? as usize;

            let end = begin
                .checked_add(len * 8)
                .filter(|&e| e <= bytes.len())
                .ok_or_else(|| NcError::Malformed(format!("variable '{name}' data out of bounds")))?;
            let data = bytes[begin..end]
                .chunks_exact(8)
                .map(|c| f64::from_be_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
                .collect();
            vars.push(NcVar { name, units, data });
        }
    } else if !(tag == 0 && var_count == 0) {
        return Err(NcError::Malformed(format!("expected variable list, got tag {tag}")));
    }

    Ok(NcFile { global_attrs, vars })
}
