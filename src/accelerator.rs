/*
 * Mnemonic accelerator table construction for the control-side engine.
 *
 * The table is derived deterministically from the mnemonic set of a widget
 * subtree: a depth-first walk collects one mnemonic character per widget
 * with marked text, and each mnemonic becomes virtual-key accelerator
 * entries the foreign container feeds to its message loop. Letters emit an
 * Alt and an Alt+Shift entry so both cases land; other characters emit one
 * entry whose shift bit mirrors the key scan.
 *
 * The scan table is a fixed US-layout mapping so regenerating the table for
 * an unchanged mnemonic set is byte-identical. [ODU-AccelDeterminismV1]
 */

use std::rc::Rc;

use crate::widget::WidgetPeer;

// ACCEL fVirt bits, as they appear on the accelerator wire.
pub const FVIRTKEY: u8 = 0x01;
pub const FSHIFT: u8 = 0x04;
pub const FCONTROL: u8 = 0x08;
pub const FALT: u8 = 0x10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccelEntry {
    pub flags: u8,
    pub key: u16,
    pub cmd: u16,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AcceleratorTable {
    entries: Vec<AccelEntry>,
}

impl AcceleratorTable {
    pub fn entries(&self) -> &[AccelEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A virtual-key scan result: the key plus its shift requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VkScan {
    pub vk: u16,
    pub shift: bool,
}

/*
 * Fixed US-layout virtual-key scan. Letters map to their uppercase key
 * code, digits to themselves, and the shifted digit row resolves to the
 * digit key plus shift. Anything unmapped yields no accelerator entry.
 */
pub fn vk_scan(ch: char) -> Option<VkScan> {
    match ch {
        'a'..='z' => Some(VkScan {
            vk: ch.to_ascii_uppercase() as u16,
            shift: false,
        }),
        'A'..='Z' => Some(VkScan {
            vk: ch as u16,
            shift: true,
        }),
        '0'..='9' => Some(VkScan {
            vk: ch as u16,
            shift: false,
        }),
        ')' => Some(VkScan { vk: b'0' as u16, shift: true }),
        '!' => Some(VkScan { vk: b'1' as u16, shift: true }),
        '@' => Some(VkScan { vk: b'2' as u16, shift: true }),
        '#' => Some(VkScan { vk: b'3' as u16, shift: true }),
        '$' => Some(VkScan { vk: b'4' as u16, shift: true }),
        '%' => Some(VkScan { vk: b'5' as u16, shift: true }),
        '^' => Some(VkScan { vk: b'6' as u16, shift: true }),
        '&' => Some(VkScan { vk: b'7' as u16, shift: true }),
        '*' => Some(VkScan { vk: b'8' as u16, shift: true }),
        '(' => Some(VkScan { vk: b'9' as u16, shift: true }),
        ' ' => Some(VkScan { vk: 0x20, shift: false }),
        '-' => Some(VkScan { vk: 0xBD, shift: false }),
        '=' => Some(VkScan { vk: 0xBB, shift: false }),
        _ => None,
    }
}

/*
 * Extracts the mnemonic character from display text: the character after
 * the first single `&` (a doubled `&&` is a literal ampersand). Uppercased
 * so the letter comparison below works on a single case.
 */
pub fn mnemonic_from_text(text: &str) -> Option<char> {
    let mut chars = text.chars();
    while let Some(ch) = chars.next() {
        if ch != '&' {
            continue;
        }
        match chars.next() {
            Some('&') => continue,
            Some(marked) => return Some(marked.to_ascii_uppercase()),
            None => return None,
        }
    }
    None
}

/// Depth-first mnemonic harvest over a widget subtree.
pub fn collect_mnemonics(widget: &Rc<dyn WidgetPeer>, out: &mut Vec<char>) {
    if let Some(mnemonic) = mnemonic_from_text(&widget.text()) {
        out.push(mnemonic);
    }
    for child in widget.children() {
        collect_mnemonics(&child, out);
    }
}

/*
 * Builds the table for a mnemonic set. Command ids number the mnemonics in
 * collection order; a letter contributes two entries sharing one command.
 */
pub fn build_table(mnemonics: &[char]) -> AcceleratorTable {
    let mut entries = Vec::with_capacity(mnemonics.len() * 2);
    let mut cmd: u16 = 0;
    for &ch in mnemonics {
        let Some(scan) = vk_scan(ch) else {
            log::warn!("Accelerator: no key scan for mnemonic '{ch}', skipping");
            cmd += 1;
            continue;
        };
        if ch.is_ascii_alphabetic() {
            entries.push(AccelEntry {
                flags: FALT | FVIRTKEY,
                key: scan.vk,
                cmd,
            });
            entries.push(AccelEntry {
                flags: FALT | FVIRTKEY | FSHIFT,
                key: scan.vk,
                cmd,
            });
        } else {
            let mut flags = FALT | FVIRTKEY;
            if scan.shift {
                flags |= FSHIFT;
            }
            entries.push(AccelEntry {
                flags,
                key: scan.vk,
                cmd,
            });
        }
        cmd += 1;
    }
    AcceleratorTable { entries }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mnemonic_extraction_honors_doubled_ampersand() {
        assert_eq!(mnemonic_from_text("&File"), Some('F'));
        assert_eq!(mnemonic_from_text("Save && E&xit"), Some('X'));
        assert_eq!(mnemonic_from_text("Plain"), None);
        assert_eq!(mnemonic_from_text("Trailing&"), None);
    }

    #[test]
    fn letters_emit_both_cases() {
        let table = build_table(&['A']);
        assert_eq!(table.len(), 2);
        assert_eq!(table.entries()[0].flags, FALT | FVIRTKEY);
        assert_eq!(table.entries()[1].flags, FALT | FVIRTKEY | FSHIFT);
        assert_eq!(table.entries()[0].key, b'A' as u16);
        assert_eq!(table.entries()[0].cmd, table.entries()[1].cmd);
    }

    #[test]
    fn non_letters_emit_one_entry_with_scan_shift() {
        let digit = build_table(&['1']);
        assert_eq!(digit.len(), 1);
        assert_eq!(digit.entries()[0].flags, FALT | FVIRTKEY);

        let shifted = build_table(&['!']);
        assert_eq!(shifted.len(), 1);
        assert_eq!(shifted.entries()[0].flags, FALT | FVIRTKEY | FSHIFT);
        assert_eq!(shifted.entries()[0].key, b'1' as u16);
    }

    #[test]
    // [ODU-AccelDeterminismV1] Regeneration without text changes is byte-identical.
    fn regeneration_is_deterministic() {
        let set = ['A', '1', 'F'];
        let first = build_table(&set);
        let second = build_table(&set);
        assert_eq!(first, second);
        assert_eq!(first.len(), 5); // two letters doubled + one digit
    }

    #[test]
    fn commands_number_mnemonics_not_entries() {
        let table = build_table(&['A', '1', 'F']);
        let cmds: Vec<u16> = table.entries().iter().map(|e| e.cmd).collect();
        assert_eq!(cmds, vec![0, 0, 1, 2, 2]);
    }
}
