// ==========================================
// 八字排盘引擎 - 领域类型定义
// ==========================================
// 内容: 天干、地支、五行、阴阳、性别、柱位、十神
// 序列化: 干支使用汉字, 反序列化同时接受拼音别名
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ==========================================
// 五行 (Element)
// ==========================================
// 生: 木→火→土→金→水→木, 克: e → e+2
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Element {
    #[serde(alias = "木")]
    Wood,
    #[serde(alias = "火")]
    Fire,
    #[serde(alias = "土")]
    Earth,
    #[serde(alias = "金")]
    Metal,
    #[serde(alias = "水")]
    Water,
}

impl Element {
    pub const ALL: [Element; 5] = [
        Element::Wood,
        Element::Fire,
        Element::Earth,
        Element::Metal,
        Element::Water,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Element {
        Element::ALL[index % 5]
    }

    /// 我生者
    pub fn generates(self) -> Element {
        Element::from_index(self.index() + 1)
    }

    /// 我克者
    pub fn restrains(self) -> Element {
        Element::from_index(self.index() + 2)
    }

    /// 生我者
    pub fn generated_by(self) -> Element {
        Element::from_index(self.index() + 4)
    }

    /// 克我者
    pub fn restrained_by(self) -> Element {
        Element::from_index(self.index() + 3)
    }

    pub fn as_cn(&self) -> &'static str {
        match self {
            Element::Wood => "木",
            Element::Fire => "火",
            Element::Earth => "土",
            Element::Metal => "金",
            Element::Water => "水",
        }
    }

    /// 以日主五行为参照, 判定另一五行与日主的关系
    pub fn relation_to(self, day_master: Element) -> ElementRelation {
        if self == day_master {
            ElementRelation::Same
        } else if self == day_master.generated_by() {
            ElementRelation::Resource
        } else if self == day_master.generates() {
            ElementRelation::Output
        } else if self == day_master.restrains() {
            ElementRelation::Wealth
        } else {
            ElementRelation::Officer
        }
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_cn())
    }
}

/// 五行相对日主的关系（比劫 / 印 / 食伤 / 财 / 官杀）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementRelation {
    Same,
    Resource,
    Output,
    Wealth,
    Officer,
}

impl ElementRelation {
    /// 比劫与印星帮身, 其余耗身
    pub fn is_supporting(self) -> bool {
        matches!(self, ElementRelation::Same | ElementRelation::Resource)
    }
}

// ==========================================
// 阴阳 (Polarity)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    Yang,
    Yin,
}

// ==========================================
// 天干 (Stem)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Stem {
    #[serde(rename = "甲", alias = "jia")]
    Jia,
    #[serde(rename = "乙", alias = "yi")]
    Yi,
    #[serde(rename = "丙", alias = "bing")]
    Bing,
    #[serde(rename = "丁", alias = "ding")]
    Ding,
    #[serde(rename = "戊", alias = "wu")]
    Wu,
    #[serde(rename = "己", alias = "ji")]
    Ji,
    #[serde(rename = "庚", alias = "geng")]
    Geng,
    #[serde(rename = "辛", alias = "xin")]
    Xin,
    #[serde(rename = "壬", alias = "ren")]
    Ren,
    #[serde(rename = "癸", alias = "gui")]
    Gui,
}

const STEM_CN: [&str; 10] = ["甲", "乙", "丙", "丁", "戊", "己", "庚", "辛", "壬", "癸"];
const STEM_PINYIN: [&str; 10] = [
    "jia", "yi", "bing", "ding", "wu", "ji", "geng", "xin", "ren", "gui",
];

impl Stem {
    pub const ALL: [Stem; 10] = [
        Stem::Jia,
        Stem::Yi,
        Stem::Bing,
        Stem::Ding,
        Stem::Wu,
        Stem::Ji,
        Stem::Geng,
        Stem::Xin,
        Stem::Ren,
        Stem::Gui,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Stem {
        Stem::ALL[index % 10]
    }

    pub fn element(self) -> Element {
        Element::from_index(self.index() / 2)
    }

    pub fn polarity(self) -> Polarity {
        if self.index() % 2 == 0 {
            Polarity::Yang
        } else {
            Polarity::Yin
        }
    }

    pub fn is_yang(self) -> bool {
        self.polarity() == Polarity::Yang
    }

    pub fn as_cn(&self) -> &'static str {
        STEM_CN[self.index()]
    }
}

impl fmt::Display for Stem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_cn())
    }
}

impl FromStr for Stem {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        STEM_CN
            .iter()
            .position(|c| *c == s)
            .or_else(|| STEM_PINYIN.iter().position(|p| p.eq_ignore_ascii_case(s)))
            .map(Stem::from_index)
            .ok_or_else(|| format!("未知天干: {}", s))
    }
}

// ==========================================
// 地支 (Branch)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Branch {
    #[serde(rename = "子", alias = "zi")]
    Zi,
    #[serde(rename = "丑", alias = "chou")]
    Chou,
    #[serde(rename = "寅", alias = "yin")]
    Yin,
    #[serde(rename = "卯", alias = "mao")]
    Mao,
    #[serde(rename = "辰", alias = "chen")]
    Chen,
    #[serde(rename = "巳", alias = "si")]
    Si,
    #[serde(rename = "午", alias = "wu")]
    Wu,
    #[serde(rename = "未", alias = "wei")]
    Wei,
    #[serde(rename = "申", alias = "shen")]
    Shen,
    #[serde(rename = "酉", alias = "you")]
    You,
    #[serde(rename = "戌", alias = "xu")]
    Xu,
    #[serde(rename = "亥", alias = "hai")]
    Hai,
}

const BRANCH_CN: [&str; 12] = [
    "子", "丑", "寅", "卯", "辰", "巳", "午", "未", "申", "酉", "戌", "亥",
];
const BRANCH_PINYIN: [&str; 12] = [
    "zi", "chou", "yin", "mao", "chen", "si", "wu", "wei", "shen", "you", "xu", "hai",
];

impl Branch {
    pub const ALL: [Branch; 12] = [
        Branch::Zi,
        Branch::Chou,
        Branch::Yin,
        Branch::Mao,
        Branch::Chen,
        Branch::Si,
        Branch::Wu,
        Branch::Wei,
        Branch::Shen,
        Branch::You,
        Branch::Xu,
        Branch::Hai,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Branch {
        Branch::ALL[index % 12]
    }

    pub fn element(self) -> Element {
        match self {
            Branch::Zi | Branch::Hai => Element::Water,
            Branch::Yin | Branch::Mao => Element::Wood,
            Branch::Si | Branch::Wu => Element::Fire,
            Branch::Shen | Branch::You => Element::Metal,
            Branch::Chou | Branch::Chen | Branch::Wei | Branch::Xu => Element::Earth,
        }
    }

    /// 地支藏干（本气、中气、余气）
    pub fn hidden_stems(self) -> &'static [Stem] {
        use Stem::*;
        match self {
            Branch::Zi => &[Gui],
            Branch::Chou => &[Ji, Gui, Xin],
            Branch::Yin => &[Jia, Bing, Wu],
            Branch::Mao => &[Yi],
            Branch::Chen => &[Wu, Yi, Gui],
            Branch::Si => &[Bing, Wu, Geng],
            Branch::Wu => &[Ding, Ji],
            Branch::Wei => &[Ji, Ding, Yi],
            Branch::Shen => &[Geng, Ren, Wu],
            Branch::You => &[Xin],
            Branch::Xu => &[Wu, Xin, Ding],
            Branch::Hai => &[Ren, Jia],
        }
    }

    /// 本气
    pub fn main_stem(self) -> Stem {
        self.hidden_stems()[0]
    }

    pub fn as_cn(&self) -> &'static str {
        BRANCH_CN[self.index()]
    }
}

impl fmt::Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_cn())
    }
}

impl FromStr for Branch {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        BRANCH_CN
            .iter()
            .position(|c| *c == s)
            .or_else(|| BRANCH_PINYIN.iter().position(|p| p.eq_ignore_ascii_case(s)))
            .map(Branch::from_index)
            .ok_or_else(|| format!("未知地支: {}", s))
    }
}

// ==========================================
// 性别 (Gender)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Gender {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "male" | "m" | "男" | "乾" => Ok(Gender::Male),
            "female" | "f" | "女" | "坤" => Ok(Gender::Female),
            other => Err(format!("未知性别: {}", other)),
        }
    }
}

// ==========================================
// 柱位 (Pillar Position)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PillarPosition {
    Year,
    Month,
    Day,
    Hour,
}

impl PillarPosition {
    pub const ALL: [PillarPosition; 4] = [
        PillarPosition::Year,
        PillarPosition::Month,
        PillarPosition::Day,
        PillarPosition::Hour,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PillarPosition::Year => "year",
            PillarPosition::Month => "month",
            PillarPosition::Day => "day",
            PillarPosition::Hour => "hour",
        }
    }

    pub fn as_cn(&self) -> &'static str {
        match self {
            PillarPosition::Year => "年",
            PillarPosition::Month => "月",
            PillarPosition::Day => "日",
            PillarPosition::Hour => "时",
        }
    }
}

impl fmt::Display for PillarPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 柱内部位：天干 / 地支 / 任一
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PillarPart {
    Stem,
    Branch,
    #[default]
    Either,
}

// ==========================================
// 十神 (Ten Gods)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TenGod {
    #[serde(alias = "比肩")]
    Friend,
    #[serde(alias = "劫财")]
    RobWealth,
    #[serde(alias = "食神")]
    EatingGod,
    #[serde(alias = "伤官")]
    HurtingOfficer,
    #[serde(alias = "偏财")]
    IndirectWealth,
    #[serde(alias = "正财")]
    DirectWealth,
    #[serde(alias = "七杀")]
    SevenKillings,
    #[serde(alias = "正官")]
    DirectOfficer,
    #[serde(alias = "偏印")]
    IndirectResource,
    #[serde(alias = "正印")]
    DirectResource,
}

impl TenGod {
    /// 以日主为参照求另一天干的十神
    pub fn of(day_master: Stem, other: Stem) -> TenGod {
        let same_polarity = day_master.polarity() == other.polarity();
        match other.element().relation_to(day_master.element()) {
            ElementRelation::Same if same_polarity => TenGod::Friend,
            ElementRelation::Same => TenGod::RobWealth,
            ElementRelation::Output if same_polarity => TenGod::EatingGod,
            ElementRelation::Output => TenGod::HurtingOfficer,
            ElementRelation::Wealth if same_polarity => TenGod::IndirectWealth,
            ElementRelation::Wealth => TenGod::DirectWealth,
            ElementRelation::Officer if same_polarity => TenGod::SevenKillings,
            ElementRelation::Officer => TenGod::DirectOfficer,
            ElementRelation::Resource if same_polarity => TenGod::IndirectResource,
            ElementRelation::Resource => TenGod::DirectResource,
        }
    }

    pub fn as_cn(&self) -> &'static str {
        match self {
            TenGod::Friend => "比肩",
            TenGod::RobWealth => "劫财",
            TenGod::EatingGod => "食神",
            TenGod::HurtingOfficer => "伤官",
            TenGod::IndirectWealth => "偏财",
            TenGod::DirectWealth => "正财",
            TenGod::SevenKillings => "七杀",
            TenGod::DirectOfficer => "正官",
            TenGod::IndirectResource => "偏印",
            TenGod::DirectResource => "正印",
        }
    }
}

impl fmt::Display for TenGod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_cn())
    }
}

// ==========================================
// 旺衰分类 (Strength Class)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrengthClass {
    #[serde(alias = "身强")]
    Strong,
    #[serde(alias = "身弱")]
    Weak,
}

impl fmt::Display for StrengthClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrengthClass::Strong => write!(f, "身强"),
            StrengthClass::Weak => write!(f, "身弱"),
        }
    }
}

// ==========================================
// 大运顺逆 (Luck Direction)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LuckDirection {
    Forward,
    Backward,
}

impl LuckDirection {
    /// 阳男阴女顺行, 阴男阳女逆行
    pub fn for_subject(year_stem: Stem, gender: Gender) -> LuckDirection {
        match (year_stem.polarity(), gender) {
            (Polarity::Yang, Gender::Male) | (Polarity::Yin, Gender::Female) => {
                LuckDirection::Forward
            }
            _ => LuckDirection::Backward,
        }
    }

    pub fn step(self) -> i64 {
        match self {
            LuckDirection::Forward => 1,
            LuckDirection::Backward => -1,
        }
    }
}
