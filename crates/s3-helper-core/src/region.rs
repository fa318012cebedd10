//! リージョン名の解決
//!
//! `us-east-1` のような実際のリージョン名を `USEast1` のような識別子名に変換し、
//! 既知リージョンの表から引く。

use std::fmt;

use crate::{Error, Result};

/// S3 エンドポイントを選択するリージョン識別子
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegionId {
    /// 識別子名 (例: `USEast1`)
    pub name: &'static str,
    /// リージョンコード (例: `us-east-1`)
    pub code: &'static str,
}

impl RegionId {
    const fn new(name: &'static str, code: &'static str) -> Self {
        Self { name, code }
    }
}

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code)
    }
}

/// リージョン未指定時に使うリージョン
pub const DEFAULT_REGION: RegionId = RegionId::new("USEast1", "us-east-1");

/// 既知のリージョン一覧
pub const KNOWN_REGIONS: &[RegionId] = &[
    DEFAULT_REGION,
    RegionId::new("USEast2", "us-east-2"),
    RegionId::new("USWest1", "us-west-1"),
    RegionId::new("USWest2", "us-west-2"),
    RegionId::new("USGovCloudEast1", "us-gov-east-1"),
    RegionId::new("USGovCloudWest1", "us-gov-west-1"),
    RegionId::new("AFSouth1", "af-south-1"),
    RegionId::new("APEast1", "ap-east-1"),
    RegionId::new("APSouth1", "ap-south-1"),
    RegionId::new("APSouth2", "ap-south-2"),
    RegionId::new("APNortheast1", "ap-northeast-1"),
    RegionId::new("APNortheast2", "ap-northeast-2"),
    RegionId::new("APNortheast3", "ap-northeast-3"),
    RegionId::new("APSoutheast1", "ap-southeast-1"),
    RegionId::new("APSoutheast2", "ap-southeast-2"),
    RegionId::new("APSoutheast3", "ap-southeast-3"),
    RegionId::new("APSoutheast4", "ap-southeast-4"),
    RegionId::new("APSoutheast5", "ap-southeast-5"),
    RegionId::new("CACentral1", "ca-central-1"),
    RegionId::new("CAWest1", "ca-west-1"),
    RegionId::new("CNNorth1", "cn-north-1"),
    RegionId::new("CNNorthwest1", "cn-northwest-1"),
    RegionId::new("EUCentral1", "eu-central-1"),
    RegionId::new("EUCentral2", "eu-central-2"),
    RegionId::new("EUNorth1", "eu-north-1"),
    RegionId::new("EUSouth1", "eu-south-1"),
    RegionId::new("EUSouth2", "eu-south-2"),
    RegionId::new("EUWest1", "eu-west-1"),
    RegionId::new("EUWest2", "eu-west-2"),
    RegionId::new("EUWest3", "eu-west-3"),
    RegionId::new("ILCentral1", "il-central-1"),
    RegionId::new("MECentral1", "me-central-1"),
    RegionId::new("MESouth1", "me-south-1"),
    RegionId::new("MXCentral1", "mx-central-1"),
    RegionId::new("SAEast1", "sa-east-1"),
];

/// `us-east-1` 形式の名前を識別子名 `USEast1` に変換する。
/// ちょうど 3 つに分割できない場合はそのまま返す。
pub fn identifier_name(region: &str) -> String {
    if !region.contains('-') {
        return region.to_string();
    }

    let pieces: Vec<&str> = region.split('-').collect();
    if pieces.len() != 3 {
        return region.to_string();
    }

    let mut middle = pieces[1].chars();
    let middle = match middle.next() {
        Some(first) => first.to_uppercase().chain(middle).collect::<String>(),
        None => String::new(),
    };

    format!("{}{}{}", pieces[0].to_uppercase(), middle, pieces[2])
}

/// リージョン名を識別子に解決
pub fn resolve(region: &str) -> Option<RegionId> {
    let name = identifier_name(region);
    KNOWN_REGIONS.iter().copied().find(|r| r.name == name)
}

/// リージョン名を解決し、見つからなければエラーを返す
pub fn resolve_or_err(region: &str) -> Result<RegionId> {
    resolve(region).ok_or_else(|| Error::UnknownRegion(region.to_string()))
}
