//! Memory layouts and their channel order tables.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{Datatype, WeightsType};

/// Element type carried by a tensor of some layout family.
pub trait ElementType: Copy + Eq + std::hash::Hash + fmt::Debug {
    fn size_in_bytes(self) -> usize;
    fn cl_type(self) -> &'static str;
}

impl ElementType for Datatype {
    fn size_in_bytes(self) -> usize {
        Datatype::size_in_bytes(self)
    }

    fn cl_type(self) -> &'static str {
        Datatype::cl_type(self)
    }
}

impl ElementType for WeightsType {
    fn size_in_bytes(self) -> usize {
        WeightsType::size_in_bytes(self)
    }

    fn cl_type(self) -> &'static str {
        WeightsType::cl_type(self)
    }
}

/// A family of memory layouts described by a channel order table.
///
/// `channel_map()[channel]` is the position of that channel in the dims
/// vector, or -1 when the layout does not carry it.
pub trait Layout: Copy + Eq + std::hash::Hash + fmt::Debug + fmt::Display + 'static {
    type Element: ElementType;

    fn channel_map(self) -> &'static [i32];
    fn is_simple(self) -> bool;
    fn as_str(self) -> &'static str;
    /// Bit index of the layout in a key's layout mask.
    fn bit(self) -> u32;

    fn channel_index(self, channel: usize) -> Option<usize> {
        match self.channel_map().get(channel) {
            Some(&idx) if idx >= 0 => Some(idx as usize),
            _ => None,
        }
    }

    fn channels_count(self) -> usize {
        self.channel_map().iter().filter(|&&idx| idx >= 0).count()
    }
}

/// Channel names of activation tensors, in channel-table order.
pub mod data_channel {
    pub const X: usize = 0;
    pub const Y: usize = 1;
    pub const FEATURE: usize = 2;
    pub const ROI: usize = 3;
    pub const BATCH: usize = 4;
    pub const COUNT: usize = 5;
}

/// Channel names of weights tensors, in channel-table order.
pub mod weights_channel {
    pub const X: usize = 0;
    pub const Y: usize = 1;
    pub const IFM: usize = 2;
    pub const OFM: usize = 3;
    pub const COUNT: usize = 4;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataLayout {
    Bf,
    Fb,
    Bfyx,
    Yxfb,
    Byxf,
    Fyxb,
    BsFBsv8Af8,
    BsFBsv16Af8,
    Brfyx,
}

impl DataLayout {
    pub const ALL: &'static [DataLayout] = &[
        DataLayout::Bf,
        DataLayout::Fb,
        DataLayout::Bfyx,
        DataLayout::Yxfb,
        DataLayout::Byxf,
        DataLayout::Fyxb,
        DataLayout::BsFBsv8Af8,
        DataLayout::BsFBsv16Af8,
        DataLayout::Brfyx,
    ];
}

impl Layout for DataLayout {
    type Element = Datatype;

    fn channel_map(self) -> &'static [i32] {
        //                                       X   Y   F  ROI  B
        match self {
            DataLayout::Bf => &[-1, -1, 0, -1, 1],
            DataLayout::Fb => &[-1, -1, 1, -1, 0],
            DataLayout::Bfyx => &[0, 1, 2, -1, 3],
            DataLayout::Yxfb => &[2, 3, 1, -1, 0],
            DataLayout::Byxf => &[1, 2, 0, -1, 3],
            DataLayout::Fyxb => &[1, 2, 3, -1, 0],
            DataLayout::BsFBsv8Af8 | DataLayout::BsFBsv16Af8 => &[-1, -1, 0, -1, 1],
            DataLayout::Brfyx => &[0, 1, 2, 3, 4],
        }
    }

    fn is_simple(self) -> bool {
        matches!(
            self,
            DataLayout::Bf | DataLayout::Fb | DataLayout::Bfyx | DataLayout::Yxfb | DataLayout::Byxf | DataLayout::Fyxb
        )
    }

    fn as_str(self) -> &'static str {
        match self {
            DataLayout::Bf => "bf",
            DataLayout::Fb => "fb",
            DataLayout::Bfyx => "bfyx",
            DataLayout::Yxfb => "yxfb",
            DataLayout::Byxf => "byxf",
            DataLayout::Fyxb => "fyxb",
            DataLayout::BsFBsv8Af8 => "bs_f_bsv8__af8",
            DataLayout::BsFBsv16Af8 => "bs_f_bsv16__af8",
            DataLayout::Brfyx => "brfyx",
        }
    }

    fn bit(self) -> u32 {
        self as u32
    }
}

impl fmt::Display for DataLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WeightsLayout {
    Oi,
    Io,
    Oiyx,
    Oyxi,
    Iyxo,
    Yxio,
    OsIyxOsv16,
    OsIOsv16,
    OsIOsv8Ai8,
    OsIOsv16Ai8,
    IYxsOsYxsv2Osv16,
    IyXsOsXsv2Osv16Ao32,
    IyXsOsXsv2Osv8Ao32,
}

impl WeightsLayout {
    pub const ALL: &'static [WeightsLayout] = &[
        WeightsLayout::Oi,
        WeightsLayout::Io,
        WeightsLayout::Oiyx,
        WeightsLayout::Oyxi,
        WeightsLayout::Iyxo,
        WeightsLayout::Yxio,
        WeightsLayout::OsIyxOsv16,
        WeightsLayout::OsIOsv16,
        WeightsLayout::OsIOsv8Ai8,
        WeightsLayout::OsIOsv16Ai8,
        WeightsLayout::IYxsOsYxsv2Osv16,
        WeightsLayout::IyXsOsXsv2Osv16Ao32,
        WeightsLayout::IyXsOsXsv2Osv8Ao32,
    ];
}

impl Layout for WeightsLayout {
    type Element = WeightsType;

    fn channel_map(self) -> &'static [i32] {
        //                                         X   Y  IFM OFM
        match self {
            WeightsLayout::Oi => &[-1, -1, 0, 1],
            WeightsLayout::Io => &[-1, -1, 1, 0],
            WeightsLayout::Oiyx | WeightsLayout::OsIyxOsv16 => &[0, 1, 2, 3],
            WeightsLayout::Oyxi => &[1, 2, 0, 3],
            WeightsLayout::Iyxo
            | WeightsLayout::IYxsOsYxsv2Osv16
            | WeightsLayout::IyXsOsXsv2Osv16Ao32
            | WeightsLayout::IyXsOsXsv2Osv8Ao32 => &[1, 2, 3, 0],
            WeightsLayout::Yxio => &[2, 3, 1, 0],
            WeightsLayout::OsIOsv16 | WeightsLayout::OsIOsv8Ai8 | WeightsLayout::OsIOsv16Ai8 => &[-1, -1, 0, 1],
        }
    }

    fn is_simple(self) -> bool {
        matches!(
            self,
            WeightsLayout::Oi | WeightsLayout::Io | WeightsLayout::Oiyx | WeightsLayout::Oyxi | WeightsLayout::Iyxo | WeightsLayout::Yxio
        )
    }

    fn as_str(self) -> &'static str {
        match self {
            WeightsLayout::Oi => "oi",
            WeightsLayout::Io => "io",
            WeightsLayout::Oiyx => "oiyx",
            WeightsLayout::Oyxi => "oyxi",
            WeightsLayout::Iyxo => "iyxo",
            WeightsLayout::Yxio => "yxio",
            WeightsLayout::OsIyxOsv16 => "os_iyx_osv16",
            WeightsLayout::OsIOsv16 => "os_i_osv16",
            WeightsLayout::OsIOsv8Ai8 => "os_i_osv8__ai8",
            WeightsLayout::OsIOsv16Ai8 => "os_i_osv16__ai8",
            WeightsLayout::IYxsOsYxsv2Osv16 => "i_yxs_os_yxsv2_osv16",
            WeightsLayout::IyXsOsXsv2Osv16Ao32 => "iy_xs_os_xsv2_osv16__ao32",
            WeightsLayout::IyXsOsXsv2Osv8Ao32 => "iy_xs_os_xsv2_osv8__ao32",
        }
    }

    fn bit(self) -> u32 {
        self as u32
    }
}

impl fmt::Display for WeightsLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
