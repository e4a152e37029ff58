//! The `.omf` module loader (spec §4.4, §6).
//!
//! Loading is split into two phases. Phase one parses and validates
//! the entire byte stream — including checking every foreign function
//! name against the host's registered callbacks — without touching
//! the heap. Phase two builds the object graph from the now-fully-
//! validated data, which cannot itself fail: every index was already
//! range-checked, and every foreign symbol was already resolved. That
//! split is what lets this loader promise "VM state is left consistent
//! on failure" (spec §7) without needing a rollback path or a pinning
//! dance over partially built objects — there is simply no allocation
//! on the failing path.

use std::collections::HashMap;

use crate::error::LoaderError;
use crate::heap::{ClassObj, FunctionObj, GcRef, HeapObject, ModuleObj, StringObj};
use crate::value::Value;
use crate::vm::Vm;

const MAGIC: u32 = 0x4f52_4249; // "ORBI"
const FORMAT_VERSION: u16 = 1;

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn need(&self, len: usize) -> Result<(), LoaderError> {
        if self.pos + len > self.bytes.len() {
            Err(LoaderError::Truncated {
                offset: self.pos,
                expected: len,
            })
        } else {
            Ok(())
        }
    }

    fn read_u8(&mut self) -> Result<u8, LoaderError> {
        self.need(1)?;
        let b = self.bytes[self.pos];
        self.pos += 1;
        Ok(b)
    }

    fn read_u16(&mut self) -> Result<u16, LoaderError> {
        self.need(2)?;
        let v = u16::from_be_bytes([self.bytes[self.pos], self.bytes[self.pos + 1]]);
        self.pos += 2;
        Ok(v)
    }

    fn read_u32(&mut self) -> Result<u32, LoaderError> {
        self.need(4)?;
        let v = u32::from_be_bytes(self.bytes[self.pos..self.pos + 4].try_into().unwrap());
        self.pos += 4;
        Ok(v)
    }

    fn read_f64(&mut self) -> Result<f64, LoaderError> {
        self.need(8)?;
        let v = f64::from_le_bytes(self.bytes[self.pos..self.pos + 8].try_into().unwrap());
        self.pos += 8;
        Ok(v)
    }

    fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], LoaderError> {
        self.need(len)?;
        let slice = &self.bytes[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }
}

#[derive(Debug, Clone)]
enum ParsedConstant {
    Nil,
    Bool(bool),
    Number(f64),
    Str(usize),
}

enum ParsedBody {
    Native(Vec<u8>),
    Foreign(usize),
}

struct ParsedFunction {
    signature: usize,
    arity: u8,
    local_count: u16,
    stack_effect: u16,
    body: ParsedBody,
}

struct ParsedClass {
    name: usize,
    field_count: u16,
    ctor: Option<usize>,
    dtor: Option<usize>,
}

struct ParsedModule {
    strings: Vec<String>,
    constants: Vec<ParsedConstant>,
    globals: Vec<ParsedConstant>,
    functions: Vec<ParsedFunction>,
    classes: Vec<ParsedClass>,
}

fn string_at<'a>(strings: &'a [String], idx: usize) -> Result<&'a str, LoaderError> {
    strings
        .get(idx)
        .map(|s| s.as_str())
        .ok_or(LoaderError::StringIndexOutOfRange { index: idx, len: strings.len() })
}

fn parse(vm: &Vm, bytes: &[u8]) -> Result<ParsedModule, LoaderError> {
    let mut cur = Cursor::new(bytes);

    let magic = cur.read_u32()?;
    if magic != MAGIC {
        return Err(LoaderError::BadMagic {
            expected: MAGIC,
            found: magic,
        });
    }
    let version = cur.read_u16()?;
    if version != FORMAT_VERSION {
        return Err(LoaderError::UnsupportedVersion {
            found: version,
            supported: FORMAT_VERSION,
        });
    }

    let string_count = cur.read_u16()? as usize;
    let mut strings = Vec::with_capacity(string_count);
    for _ in 0..string_count {
        let len = cur.read_u16()? as usize;
        let raw = cur.read_bytes(len)?;
        let s = std::str::from_utf8(raw).map_err(|e| LoaderError::MalformedSection {
            section: "string_pool",
            reason: e.to_string(),
        })?;
        strings.push(s.to_string());
    }

    let parse_constant = |cur: &mut Cursor, strings: &[String]| -> Result<ParsedConstant, LoaderError> {
        match cur.read_u8()? {
            0 => Ok(ParsedConstant::Nil),
            1 => Ok(ParsedConstant::Bool(false)),
            2 => Ok(ParsedConstant::Bool(true)),
            3 => Ok(ParsedConstant::Number(cur.read_f64()?)),
            4 => {
                let idx = cur.read_u16()? as usize;
                string_at(strings, idx)?;
                Ok(ParsedConstant::Str(idx))
            }
            other => Err(LoaderError::MalformedSection {
                section: "constant_pool",
                reason: format!("unknown constant tag {other:#04x}"),
            }),
        }
    };

    let constant_count = cur.read_u16()? as usize;
    let mut constants = Vec::with_capacity(constant_count);
    for _ in 0..constant_count {
        constants.push(parse_constant(&mut cur, &strings)?);
    }

    let global_count = cur.read_u16()? as usize;
    let mut globals = Vec::with_capacity(global_count);
    for _ in 0..global_count {
        globals.push(parse_constant(&mut cur, &strings)?);
    }

    let function_count = cur.read_u16()? as usize;
    let mut functions = Vec::with_capacity(function_count);
    for _ in 0..function_count {
        let signature = cur.read_u16()? as usize;
        string_at(&strings, signature)?;
        let arity = cur.read_u8()?;
        let local_count = cur.read_u16()?;
        let stack_effect = cur.read_u16()?;
        let kind = cur.read_u8()?;
        let body = match kind {
            0 => {
                let len = cur.read_u32()? as usize;
                let bytecode = cur.read_bytes(len)?.to_vec();
                ParsedBody::Native(bytecode)
            }
            1 => {
                let name_idx = cur.read_u16()? as usize;
                let name = string_at(&strings, name_idx)?;
                if !vm.foreign_symbols.contains_key(name) {
                    return Err(LoaderError::UnknownForeignSymbol {
                        name: name.to_string(),
                    });
                }
                ParsedBody::Foreign(name_idx)
            }
            other => {
                return Err(LoaderError::MalformedSection {
                    section: "function_table",
                    reason: format!("unknown function kind {other:#04x}"),
                })
            }
        };
        functions.push(ParsedFunction {
            signature,
            arity,
            local_count,
            stack_effect,
            body,
        });
    }

    let class_count = cur.read_u16()? as usize;
    let mut classes = Vec::with_capacity(class_count);
    for _ in 0..class_count {
        let name = cur.read_u16()? as usize;
        string_at(&strings, name)?;
        let field_count = cur.read_u16()?;
        let has_ctor = cur.read_u8()?;
        let ctor = if has_ctor != 0 {
            let idx = cur.read_u16()? as usize;
            if idx >= functions.len() {
                return Err(LoaderError::MalformedSection {
                    section: "class_table",
                    reason: format!("constructor function index {idx} out of range"),
                });
            }
            Some(idx)
        } else {
            None
        };
        let has_dtor = cur.read_u8()?;
        let dtor = if has_dtor != 0 {
            let idx = cur.read_u16()? as usize;
            if idx >= functions.len() {
                return Err(LoaderError::MalformedSection {
                    section: "class_table",
                    reason: format!("destructor function index {idx} out of range"),
                });
            }
            Some(idx)
        } else {
            None
        };
        classes.push(ParsedClass {
            name,
            field_count,
            ctor,
            dtor,
        });
    }

    Ok(ParsedModule {
        strings,
        constants,
        globals,
        functions,
        classes,
    })
}

/// Builds the heap object graph from already-validated data. Cannot
/// fail: every string/function/class index was range-checked in
/// [`parse`], and every foreign symbol was already resolved there too.
fn build(vm: &mut Vm, name: &str, parsed: ParsedModule) -> GcRef {
    let string_refs: Vec<GcRef> = parsed
        .strings
        .iter()
        .map(|s| vm.heap.insert(HeapObject::String(StringObj::new(s.clone()))))
        .collect();

    let resolve_constant = |c: &ParsedConstant| -> Value {
        match c {
            ParsedConstant::Nil => Value::Nil,
            ParsedConstant::Bool(b) => Value::Bool(*b),
            ParsedConstant::Number(n) => Value::Number(*n),
            ParsedConstant::Str(idx) => Value::Object(string_refs[*idx]),
        }
    };

    let constants: Vec<Value> = parsed.constants.iter().map(resolve_constant).collect();
    let global_count = parsed.globals.len();

    let module_ref = vm.heap.insert(HeapObject::Module(ModuleObj::new(
        name,
        constants,
        global_count,
    )));
    for (i, g) in parsed.globals.iter().enumerate() {
        let value = resolve_constant(g);
        vm.heap.as_module_mut(module_ref).unwrap().globals[i] = value;
    }

    let mut function_refs: Vec<GcRef> = Vec::with_capacity(parsed.functions.len());
    for f in &parsed.functions {
        let signature = parsed.strings[f.signature].clone();
        let func_obj = match &f.body {
            ParsedBody::Native(bytecode) => FunctionObj::native(
                signature,
                bytecode.clone(),
                f.arity,
                f.local_count,
                f.stack_effect,
                module_ref,
            ),
            ParsedBody::Foreign(name_idx) => {
                let foreign_name = &parsed.strings[*name_idx];
                let callback = vm
                    .foreign_symbols
                    .get(foreign_name)
                    .expect("foreign symbol already validated during parse")
                    .clone();
                FunctionObj::foreign(signature, f.arity, callback)
            }
        };
        function_refs.push(vm.heap.insert(HeapObject::Function(func_obj)));
    }

    let mut class_refs: Vec<GcRef> = Vec::with_capacity(parsed.classes.len());
    for c in &parsed.classes {
        let mut class_obj = ClassObj::new(parsed.strings[c.name].clone(), c.field_count as usize);
        class_obj.ctor = c.ctor.map(|i| Value::Object(function_refs[i]));
        class_obj.dtor = c.dtor.map(|i| Value::Object(function_refs[i]));
        class_refs.push(vm.heap.insert(HeapObject::Class(class_obj)));
    }

    {
        let m = vm.heap.as_module_mut(module_ref).unwrap();
        let mut functions = HashMap::new();
        for (f, r) in parsed.functions.iter().zip(function_refs.iter()) {
            functions.insert(parsed.strings[f.signature].clone(), *r);
        }
        let mut classes = HashMap::new();
        for (c, r) in parsed.classes.iter().zip(class_refs.iter()) {
            classes.insert(parsed.strings[c.name].clone(), *r);
        }
        m.functions = functions;
        m.classes = classes;
    }

    for (f, r) in parsed.functions.iter().zip(function_refs.iter()) {
        let signature_value = Value::Object(string_refs[f.signature]);
        vm.heap
            .with_map_mut(vm.dispatch_table, |map, heap| {
                map.insert(signature_value, Value::Object(*r), heap)
            });
    }
    for (c, r) in parsed.classes.iter().zip(class_refs.iter()) {
        let name_value = Value::Object(string_refs[c.name]);
        vm.heap
            .with_map_mut(vm.class_table, |map, heap| {
                map.insert(name_value, Value::Object(*r), heap)
            });
    }

    module_ref
}

pub fn load(vm: &mut Vm, name: &str, bytes: &[u8]) -> Result<GcRef, LoaderError> {
    let parsed = parse(vm, bytes)?;
    let module_ref = build(vm, name, parsed);
    let name_ref = vm.heap.insert(HeapObject::String(StringObj::new(name)));
    vm.heap.with_map_mut(vm.module_table, |map, heap| {
        map.insert(Value::Object(name_ref), Value::Object(module_ref), heap)
    });
    Ok(module_ref)
}
