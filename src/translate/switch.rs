//! `switch` statements, as `tableswitch` or `lookupswitch`

use super::env::{Env, EnvKind};
use super::method::MethodTranslator;
use super::Error;
use crate::jvm::opcodes::{LOOKUPSWITCH, TABLESWITCH};
use crate::jvm::Type;
use crate::tree::{Case, Expr};

/// Pick the cheaper switch instruction for `nlabels` labels spanning `lo..=hi`
///
/// Costs weigh space (in 4-byte words) against time (in comparisons), with time counting
/// three times as much.
pub fn switch_opcode(nlabels: usize, lo: i32, hi: i32) -> u8 {
    if nlabels == 0 {
        return LOOKUPSWITCH;
    }
    let nlabels = nlabels as i64;
    let table_space_cost = 4 + (hi as i64 - lo as i64 + 1);
    let table_time_cost = 3;
    let lookup_space_cost = 3 + 2 * nlabels;
    let lookup_time_cost = nlabels;
    if table_space_cost + 3 * table_time_cost <= lookup_space_cost + 3 * lookup_time_cost {
        TABLESWITCH
    } else {
        LOOKUPSWITCH
    }
}

impl<'a, 'g, 't> MethodTranslator<'a, 'g, 't> {
    pub(super) fn gen_switch(&mut self, selector: &'t Expr, cases: &'t [Case]) -> Result<(), Error> {
        let limit = self.code.nextreg;
        let sel = self.gen_expr(selector, &Type::INT)?;
        if cases.is_empty() {
            let loaded = self.items().load(sel)?;
            self.items().drop(loaded)?;
            self.code.end_scopes(limit)?;
            return Ok(());
        }
        self.items().load(sel)?;

        let labels: Vec<i32> = cases.iter().filter_map(|case| case.label).collect();
        let lo = labels.iter().copied().min().unwrap_or(i32::MAX);
        let hi = labels.iter().copied().max().unwrap_or(i32::MIN);
        let opcode = switch_opcode(labels.len(), lo, hi);

        let start_pc = self.code.cur_cp()?;
        self.code.emitop0(opcode)?;
        self.code.align(4)?;
        let table_base = self.code.cur_cp()?;
        self.code.emit4(-1);
        if opcode == TABLESWITCH {
            self.code.emit4(lo);
            self.code.emit4(hi);
            for _ in lo as i64..=hi as i64 {
                self.code.emit4(-1);
            }
        } else {
            self.code.emit4(labels.len() as i32);
            for _ in 0..labels.len() {
                self.code.emit4(-1);
                self.code.emit4(-1);
            }
        }
        let state_switch = self.code.state.clone();
        self.code.mark_dead();

        let mut offsets: Vec<(i32, i32)> = Vec::with_capacity(labels.len());
        self.envs.push(Env::new(EnvKind::Switch));
        for case in cases {
            let offset = (self.code.entry_point_with(&state_switch)? - start_pc) as i32;
            match case.label {
                Some(label) if opcode == TABLESWITCH => {
                    let slot = table_base + 4 * (label as i64 - lo as i64 + 3) as usize;
                    self.code.put4(slot, offset);
                }
                Some(label) => offsets.push((label, offset)),
                None => self.code.put4(table_base, offset),
            }
            self.gen_stats(&case.stats)?;
        }
        let env = self.envs.pop()?;
        self.code.resolve(env.exit)?;

        if self.code.get4(table_base) == -1 {
            let offset = (self.code.entry_point_with(&state_switch)? - start_pc) as i32;
            self.code.put4(table_base, offset);
        }
        if opcode == TABLESWITCH {
            let default_offset = self.code.get4(table_base);
            for i in 0..=(hi as i64 - lo as i64) as usize {
                let slot = table_base + 4 * (i + 3);
                if self.code.get4(slot) == -1 {
                    self.code.put4(slot, default_offset);
                }
            }
        } else {
            offsets.sort_by_key(|(label, _)| *label);
            for (i, (label, offset)) in offsets.into_iter().enumerate() {
                let pair = table_base + 8 * (i + 1);
                self.code.put4(pair, label);
                self.code.put4(pair + 4, offset);
            }
        }

        self.code.end_scopes(limit)?;
        Ok(())
    }
}
